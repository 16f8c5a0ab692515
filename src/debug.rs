use core::{
    fmt::{self, Write as _},
    ptr::NonNull,
};
use std::collections::VecDeque;

use crate::{AvlMap, Node};

impl<K: Ord, V> AvlMap<K, V> {
    /// Renders the tree as a Graphviz digraph, one row per depth, with each
    /// node labeled `key:balance`. Missing children are drawn as points so
    /// that left and right subtrees stay visually distinct.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<K, V> {
            Node(NonNull<Node<K, V>>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        loop {
            let remaining = queue.len();
            if remaining == 0 {
                break;
            }

            write!(w, "{{rank=same; ")?;

            for _row_node in 0..remaining {
                let node = match queue.pop_front().unwrap() {
                    Item::Node(node) => node,
                    Item::Missing(id) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                };

                let node_ref = unsafe { node.as_ref() };
                let key = &node_ref.key;
                let balance = node_ref.balance;
                write!(w, "\"graph{name}-{key}\" [label=\"{key}:{balance}\"]; ")?;

                for child in [node_ref.left(), node_ref.right()] {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { &child.as_ref().key };

                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                            queue.push_back(Item::Node(child));
                        }
                        None => {
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            queue.push_back(Item::Missing(missing));
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}
