//! Scroll position, page scale and form-control state kept in history items.

use crate::engine::Engine;
use crate::ids::FrameId;
use crate::types::FrameState;
use log::trace;

impl Engine {
    /// Form controls of the document changed; the embedder may want to persist the item.
    pub fn mark_document_state_dirty(&mut self, frame: FrameId) {
        let Some(document) = self.document_mut(frame) else {
            return;
        };
        document.history_state_dirty = true;
        if let Some(client) = self.client(frame) {
            client.did_update_current_history_item(self, frame);
        }
    }

    pub(crate) fn save_document_state(&mut self, frame: FrameId) {
        let Some(state) = self.frames.get_mut(&frame) else {
            return;
        };
        let (Some(item), Some(document)) = (&state.loader.current_item, &mut state.document) else {
            return;
        };
        if !document.history_state_dirty {
            return;
        }
        item.borrow_mut().document_state = document.form_element_state();
        document.history_state_dirty = false;
    }

    pub(crate) fn save_scroll_state(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        let Some(item) = state.loader.current_item.clone() else {
            return;
        };
        // The position may still be restored later.
        if state.loader.load_type.needs_history_item_restore() && !state.view.was_scrolled_by_user {
            return;
        }
        let scroll_position = state.view.scroll_position;
        let page_scale_factor = match state.parent {
            None => self.page(state.page).map(|page| page.page_scale_factor),
            Some(_) => None,
        };
        {
            let mut item = item.borrow_mut();
            item.scroll_point = scroll_position;
            if let Some(scale) = page_scale_factor {
                item.page_scale_factor = scale;
            }
        }
        if let Some(client) = self.client(frame) {
            client.did_update_current_history_item(self, frame);
        }
    }

    /// Forgets the main frame's saved scroll position and page scale.
    pub fn clear_scroll_position_and_view_state(&mut self, frame: FrameId) {
        let Some(item) = self
            .frame_ref(frame)
            .filter(|state| state.parent.is_none())
            .and_then(|state| state.loader.current_item.clone())
        else {
            return;
        };
        let mut item = item.borrow_mut();
        item.clear_scroll_point();
        item.page_scale_factor = 0.0;
    }

    /// Applies the current item's scroll position after a reload or traversal.
    ///
    /// Until the frame completes, a position the layout would clamp is left
    /// for a later attempt, and a user scroll always wins.
    pub(crate) fn restore_scroll_position_and_view_state(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        let Some(item) = state.loader.current_item.clone() else {
            return;
        };
        if !state.loader.state_machine.committed_first_real_document_load()
            || !state.loader.load_type.needs_history_item_restore()
        {
            return;
        }
        let (scroll_point, page_scale_factor) = {
            let item = item.borrow();
            (item.scroll_point, item.page_scale_factor)
        };
        let view = &state.view;
        let can_restore_without_clamping = view.clamp(scroll_point) == scroll_point;
        let can_restore = !view.was_scrolled_by_user
            && (can_restore_without_clamping || state.loader.state == FrameState::Complete);
        if !can_restore {
            return;
        }
        let restores_page_scale = state.parent.is_none() && page_scale_factor != 0.0;
        let page = state.page;

        if restores_page_scale {
            if let Some(page) = self.pages.get_mut(&page) {
                page.page_scale_factor = page_scale_factor;
            }
        }
        if let Some(state) = self.frame_mut(frame) {
            state.view.set_scroll_position(scroll_point);
            trace!("{frame}: restored scroll position {scroll_point:?}");
        }
    }
}
