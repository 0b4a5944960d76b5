//! Backing history: what a root-level view has pointed at over time.

use crate::error::Result;
use crate::view::View;
use backing_tree::{anchor_gindex, Gindex, Hash256, Node, Subtree, LEFT_GINDEX, RIGHT_GINDEX};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// An append-only record of every backing a view has held, fed by the view's
/// top-level hook. Attach to root-level views only: sub-views already carry
/// their parent hook.
pub struct History {
    records: Rc<RefCell<Vec<Arc<Node>>>>,
}

impl History {
    pub fn attach(view: &View) -> History {
        let records = Rc::new(RefCell::new(vec![view.backing()]));
        let sink = Rc::clone(&records);
        view.install_hook(Rc::new(move |node: &Arc<Node>| {
            sink.borrow_mut().push(node.clone());
            Ok(())
        }));
        History { records }
    }

    /// The recorded backings, oldest first. The initial backing is index 0.
    pub fn backings(&self) -> Vec<Arc<Node>> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

/// Reduce an ordered, keyed series of root backings to the history of the
/// subtree at `target`: one entry per distinct value, keyed by the root in
/// which it first appeared.
///
/// Equal consecutive roots are dropped level by level on the way down, so runs
/// of roots that never touched `target` cost one comparison each, not a full
/// descent.
pub fn target_history<K: Clone>(
    history: &[(K, Arc<Node>)],
    target: Gindex,
) -> Result<Vec<(K, Arc<Node>)>> {
    if target == backing_tree::ROOT_GINDEX {
        let mut out: Vec<(K, Arc<Node>)> = vec![];
        let mut last: Option<Hash256> = None;
        for (key, node) in history {
            let root = node.root();
            if last != Some(root) {
                out.push((key.clone(), node.clone()));
                last = Some(root);
            }
        }
        return Ok(out);
    }

    let anchor = anchor_gindex(target);
    let pivot = anchor >> 1;
    let unanchor = target ^ anchor;
    let sub = if unanchor < pivot {
        LEFT_GINDEX
    } else {
        RIGHT_GINDEX
    };

    let mut out: Vec<(K, Arc<Node>)> = vec![];
    let mut last: Option<Hash256> = None;
    for (key, node) in history {
        let child = node.getter(sub)?;
        let root = child.root();
        if last != Some(root) {
            out.push((key.clone(), child));
            last = Some(root);
        }
    }

    // `pivot | unanchor` re-anchors the target relative to the child.
    target_history(&out, pivot | unanchor)
}
