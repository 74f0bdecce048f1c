//! termtree rendering of a root forest

use termtree::Tree;
use tracing::instrument;

use crate::domain::{Root, RootForest, RootIndex};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

fn label(root: &Root) -> String {
    let mut s = format!(
        "{} [{}] order={} {} len={:.2}cm",
        root.id(),
        root.key(),
        root.child_order(),
        root.ontology_label(),
        root.l_pos_pixels_to_cm(root.root_length()),
    );
    if let Some(i) = root.insertion() {
        s.push_str(&format!(
            " @{:.2}cm {:.1}°",
            root.l_pos_pixels_to_cm(i.distance_from_base),
            i.angle_degrees()
        ));
    }
    s
}

impl TreeNodeConvert for RootForest {
    /// One branch per primary root, children ordered as attached.
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        fn build_tree(forest: &RootForest, idx: RootIndex, parent_tree: &mut Tree<String>) {
            if let Some(root) = forest.get(idx) {
                for &child_idx in root.children() {
                    if let Some(child) = forest.get(child_idx) {
                        let mut child_tree = Tree::new(label(child));
                        build_tree(forest, child_idx, &mut child_tree);
                        parent_tree.push(child_tree);
                    }
                }
            }
        }

        let title = match &self.metadata.image {
            Some(image) => format!("{} ({} roots, dpi {:.1})", image, self.len(), self.dpi()),
            None => format!("{} roots, dpi {:.1}", self.len(), self.dpi()),
        };
        let mut tree = Tree::new(title);
        for (idx, root) in self.primaries() {
            let mut primary = Tree::new(label(root));
            build_tree(self, idx, &mut primary);
            tree.push(primary);
        }
        tree
    }
}
