//! Frame tree traversal and name lookup.

use crate::engine::Engine;
use crate::ids::FrameId;

const FRAME_PATH_PREFIX: &str = "<!--framePath ";
const FRAME_PATH_SUFFIX: &str = "-->";

impl Engine {
    pub fn parent_of(&self, frame: FrameId) -> Option<FrameId> {
        self.frame_ref(frame)?.parent
    }

    pub fn children_of(&self, frame: FrameId) -> Vec<FrameId> {
        self.frame_ref(frame)
            .map(|state| state.children.clone())
            .unwrap_or_default()
    }

    /// Root of the tree `frame` belongs to.
    pub fn top(&self, frame: FrameId) -> FrameId {
        let mut current = frame;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        current
    }

    pub fn next_sibling(&self, frame: FrameId) -> Option<FrameId> {
        let parent = self.parent_of(frame)?;
        let siblings = &self.frame_ref(parent)?.children;
        let index = siblings.iter().position(|child| *child == frame)?;
        siblings.get(index + 1).copied()
    }

    /// Pre-order successor of `frame`, never leaving the subtree rooted at `stay_within`.
    pub fn traverse_next(&self, frame: FrameId, stay_within: Option<FrameId>) -> Option<FrameId> {
        if let Some(child) = self.frame_ref(frame)?.children.first() {
            return Some(*child);
        }
        if Some(frame) == stay_within {
            return None;
        }
        if let Some(sibling) = self.next_sibling(frame) {
            return Some(sibling);
        }
        let mut current = frame;
        loop {
            let parent = self.parent_of(current)?;
            if Some(parent) == stay_within {
                return None;
            }
            if let Some(sibling) = self.next_sibling(parent) {
                return Some(sibling);
            }
            current = parent;
        }
    }

    /// `frame` and its descendants in document order.
    pub fn subtree(&self, frame: FrameId) -> Vec<FrameId> {
        if !self.is_alive(frame) {
            return Vec::new();
        }
        let mut frames = vec![frame];
        let mut next = self.traverse_next(frame, Some(frame));
        while let Some(current) = next {
            frames.push(current);
            next = self.traverse_next(current, Some(frame));
        }
        frames
    }

    /// True when `ancestor` is `frame` or one of its ancestors on the same page.
    pub fn is_descendant_of(&self, frame: FrameId, ancestor: FrameId) -> bool {
        let (Some(state), Some(ancestor_state)) = (self.frame_ref(frame), self.frame_ref(ancestor)) else {
            return false;
        };
        if state.page != ancestor_state.page {
            return false;
        }
        let mut current = Some(frame);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent_of(candidate);
        }
        false
    }

    /// Resolves a navigation target name as seen from `frame`.
    ///
    /// Named lookup compares unique names and searches the frame's own
    /// subtree, then its page, then every other page.
    pub fn find_frame(&self, frame: FrameId, name: &str) -> Option<FrameId> {
        let state = self.frame_ref(frame)?;
        match name {
            "" | "_self" | "_current" => return Some(frame),
            "_top" => return Some(self.top(frame)),
            "_parent" => return Some(state.parent.unwrap_or(frame)),
            "_blank" => return None,
            _ => {}
        }

        let named = |candidate: &FrameId| {
            self.frame_ref(*candidate)
                .is_some_and(|state| state.unique_name == name)
        };
        if let Some(found) = self.subtree(frame).into_iter().find(named) {
            return Some(found);
        }
        let page = state.page;
        let main_frame = self.page(page)?.main_frame;
        if let Some(found) = self.subtree(main_frame).into_iter().find(named) {
            return Some(found);
        }
        self.pages
            .values()
            .filter(|other| other.id != page)
            .find_map(|other| self.subtree(other.main_frame).into_iter().find(named))
    }

    /// Name for a new child of `parent` that is unique within the whole tree.
    ///
    /// Must run after the child has been appended, so its index is the last one.
    pub(crate) fn unique_child_name(&self, parent: FrameId, requested: &str) -> String {
        let taken = self.children_of(parent).iter().any(|child| {
            self.frame_ref(*child)
                .is_some_and(|state| state.unique_name == requested)
        });
        if !requested.is_empty() && !taken && requested != "_blank" {
            return requested.to_owned();
        }

        let mut chain = Vec::new();
        let mut with_path = None;
        let mut current = Some(parent);
        while let Some(frame) = current {
            let Some(state) = self.frame_ref(frame) else {
                break;
            };
            if state.unique_name.starts_with(FRAME_PATH_PREFIX) {
                with_path = Some(state.unique_name.as_str());
                break;
            }
            chain.push(state.unique_name.as_str());
            current = state.parent;
        }

        let mut name = FRAME_PATH_PREFIX.to_owned();
        if let Some(path) = with_path {
            let end = path.len().saturating_sub(FRAME_PATH_SUFFIX.len());
            name.push_str(path.get(FRAME_PATH_PREFIX.len()..end).unwrap_or_default());
        }
        for unique_name in chain.iter().rev() {
            name.push('/');
            name.push_str(unique_name);
        }
        let index = self.children_of(parent).len().saturating_sub(1);
        name.push_str(&format!("/<!--frame{index}-->{FRAME_PATH_SUFFIX}"));
        name
    }

    /// The highest frame below which a fragment scroll must not be reported,
    /// because the next ancestor up is cross-origin to `frame`'s document.
    pub fn find_unsafe_parent_scroll_propagation_boundary(&self, frame: FrameId) -> Option<FrameId> {
        let origin = &self.document(frame)?.security_origin;
        let mut current = frame;
        while let Some(ancestor) = self.parent_of(current) {
            let accessible = self
                .document(ancestor)
                .is_some_and(|document| document.security_origin.can_access(origin));
            if !accessible {
                return Some(current);
            }
            current = ancestor;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::client::FrameLoaderClient;
    use crate::client::InertDocumentHost;
    use crate::engine::Engine;
    use crate::frame::FrameOwner;
    use crate::ids::FrameId;
    use crate::settings::LoaderSettings;
    use pd_privacy::PrivacyPolicy;
    use pd_security::SecurityPolicy;
    use std::rc::Rc;

    struct Quiet;

    impl FrameLoaderClient for Quiet {}

    fn engine() -> Engine {
        match Engine::new(LoaderSettings::default(), SecurityPolicy::default(), PrivacyPolicy::default()) {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        }
    }

    fn main_frame(engine: &mut Engine) -> FrameId {
        let page = engine.create_page(Rc::new(Quiet), Rc::new(InertDocumentHost));
        match engine.page(page) {
            Some(page) => page.main_frame(),
            None => panic!("page missing"),
        }
    }

    fn child(engine: &mut Engine, parent: FrameId, name: &str) -> FrameId {
        match engine.create_child_frame(parent, FrameOwner::iframe(name), None) {
            Ok(frame) => frame,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn traversal_is_preorder_and_bounded() {
        let mut engine = engine();
        let root = main_frame(&mut engine);
        let a = child(&mut engine, root, "a");
        let a1 = child(&mut engine, a, "a1");
        let b = child(&mut engine, root, "b");

        assert_eq!(engine.subtree(root), vec![root, a, a1, b]);
        assert_eq!(engine.traverse_next(a1, None), Some(b));
        assert_eq!(engine.traverse_next(a1, Some(a)), None);
        assert!(engine.is_descendant_of(a1, root));
        assert!(!engine.is_descendant_of(b, a));
        assert_eq!(engine.top(a1), root);
    }

    #[test]
    fn reserved_names_resolve_relative_to_the_frame() {
        let mut engine = engine();
        let root = main_frame(&mut engine);
        let a = child(&mut engine, root, "a");

        assert_eq!(engine.find_frame(a, "_self"), Some(a));
        assert_eq!(engine.find_frame(a, ""), Some(a));
        assert_eq!(engine.find_frame(a, "_parent"), Some(root));
        assert_eq!(engine.find_frame(root, "_parent"), Some(root));
        assert_eq!(engine.find_frame(a, "_top"), Some(root));
        assert_eq!(engine.find_frame(a, "_blank"), None);
    }

    #[test]
    fn named_lookup_falls_back_to_other_pages() {
        let mut engine = engine();
        let first = main_frame(&mut engine);
        let second = main_frame(&mut engine);
        let elsewhere = child(&mut engine, second, "elsewhere");

        assert_eq!(engine.find_frame(first, "elsewhere"), Some(elsewhere));
        assert_eq!(engine.find_frame(first, "missing"), None);
    }

    #[test]
    fn unnamed_children_get_path_names() {
        let mut engine = engine();
        let root = main_frame(&mut engine);
        let named = child(&mut engine, root, "ad");
        let unnamed = child(&mut engine, root, "");
        let nested = child(&mut engine, unnamed, "");
        let duplicate = child(&mut engine, root, "ad");

        let unique = |frame| {
            engine
                .frame(frame)
                .map(|state| state.unique_name().to_owned())
                .unwrap_or_default()
        };
        assert_eq!(unique(named), "ad");
        assert_eq!(unique(unnamed), "<!--framePath //<!--frame1-->-->");
        assert_eq!(unique(nested), "<!--framePath //<!--frame1-->/<!--frame0-->-->");
        assert_eq!(unique(duplicate), "<!--framePath //<!--frame2-->-->");
    }

    #[test]
    fn reused_names_resolve_to_the_first_frame() {
        let mut engine = engine();
        let root = main_frame(&mut engine);
        let first = child(&mut engine, root, "ad");
        let duplicate = child(&mut engine, root, "ad");

        assert_eq!(engine.find_frame(duplicate, "ad"), Some(first));
        assert_eq!(engine.find_frame(root, "ad"), Some(first));
        assert_eq!(engine.frame(duplicate).map(|state| state.name()), Some("ad"));
    }
}
