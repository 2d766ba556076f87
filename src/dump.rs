//! Debug text dumps of diagrams.
//!
//! Two formats are provided, neither of them stable:
//!
//! - a nested bracket string, where every AND-node is printed as
//!   `weight*[children]` and every MetaNode as `(var: and | and | ...)`;
//! - a node listing with one line per MetaNode, grouped by variable:
//!
//! ```text
//! root 1*[@4]
//! @4 x0: 1*[@2] | 1*[@3]
//! @2 x1: 1*[1] | 2*[1]
//! @3 x1: 3*[1] | 4*[1]
//! ```

use std::collections::BTreeMap;
use std::io;

use crate::node::AndNode;
use crate::reference::Ref;
use crate::store::Store;
use crate::types::Var;

impl Store {
    /// Render the diagram as a nested bracket expression.
    ///
    /// Shared nodes are printed at every occurrence.
    pub fn to_bracket_string(&self, root: &AndNode) -> String {
        let mut out = String::new();
        self.bracket_and(root, &mut out);
        out
    }

    fn bracket_and(&self, and: &AndNode, out: &mut String) {
        out.push_str(&format!("{}*[", and.weight()));
        for (i, &child) in and.children().iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if child.is_terminal() {
                out.push_str(&child.to_string());
            } else {
                self.bracket_node(child, out);
            }
        }
        out.push(']');
    }

    fn bracket_node(&self, node: Ref, out: &mut String) {
        let meta = self.node(node);
        out.push_str(&format!("({}: ", meta.var()));
        for (i, child) in meta.children().iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            self.bracket_and(child, out);
        }
        out.push(')');
    }

    /// Write one line per MetaNode reachable from `root`.
    pub fn write_diagram<W: io::Write>(&self, root: &AndNode, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "root {}", root)?;

        let mut levels = BTreeMap::<Var, Vec<Ref>>::new();
        for node in self.descendants(root.nodes().iter().copied()) {
            levels.entry(self.var(node)).or_default().push(node);
        }

        for nodes in levels.values_mut() {
            nodes.sort_unstable();
            for &node in nodes.iter() {
                let meta = self.node(node);
                let children: Vec<String> = meta.children().iter().map(|c| c.to_string()).collect();
                writeln!(writer, "{} {}: {}", node, meta.var(), children.join(" | "))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_bracket_string() {
        let store = Store::default();
        let leaf = store.mk_node(Var::new(1), vec![AndNode::constant(1.0), AndNode::constant(2.0)]);
        let root = AndNode::new(0.5, [leaf]);
        assert_eq!(store.to_bracket_string(&root), "0.5*[(x1: 1*[1] | 2*[1])]");
        assert_eq!(store.to_bracket_string(&AndNode::zero()), "0*[0]");
    }

    #[test]
    fn test_write_diagram() {
        let store = Store::default();
        let leaf = store.mk_node(Var::new(1), vec![AndNode::constant(1.0), AndNode::zero()]);
        let top = store.mk_node(Var::new(0), vec![AndNode::new(1.0, [leaf]), AndNode::one()]);
        let root = AndNode::new(2.0, [top]);

        let mut out = Vec::new();
        store.write_diagram(&root, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("root 2*[{}]", top));
        assert_eq!(lines[1], format!("{} x0: 1*[{}] | 1*[1]", top, leaf));
        assert_eq!(lines[2], format!("{} x1: 1*[1] | 0*[0]", leaf));
    }
}
