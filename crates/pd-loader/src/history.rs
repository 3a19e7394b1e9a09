//! History items and the per-page back/forward list.

use crate::types::ScrollOffset;
use pd_core::IdentifierSource;
use pd_net::FormData;
use pd_net::ResourceRequest;
use pd_privacy::ReferrerPolicy;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

/// Shared handle: the back/forward list and a frame's loader point at the same item.
pub type HistoryItemHandle = Rc<RefCell<HistoryItem>>;

/// One navigable state of a frame.
///
/// Two items with the same `document_sequence_number` describe the same
/// document (pushState, fragment navigations); a differing number means a
/// back/forward traversal must load a new document.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub url: Url,
    pub referrer: Option<String>,
    pub referrer_policy: ReferrerPolicy,
    /// Unique name of the frame the item belongs to.
    pub target: String,
    pub scroll_point: ScrollOffset,
    /// Zero means "not recorded".
    pub page_scale_factor: f32,
    pub state_object: Option<String>,
    pub form_data: Option<FormData>,
    pub form_content_type: Option<String>,
    pub document_state: Vec<String>,
    pub item_sequence_number: i64,
    pub document_sequence_number: i64,
}

impl HistoryItem {
    pub fn new(url: Url, ids: &mut IdentifierSource) -> Self {
        let item_sequence_number = ids.next_id();
        let document_sequence_number = ids.next_id();
        Self {
            url,
            referrer: None,
            referrer_policy: ReferrerPolicy::Default,
            target: String::new(),
            scroll_point: ScrollOffset::default(),
            page_scale_factor: 0.0,
            state_object: None,
            form_data: None,
            form_content_type: None,
            document_state: Vec::new(),
            item_sequence_number,
            document_sequence_number,
        }
    }

    pub fn into_handle(self) -> HistoryItemHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn generate_new_sequence_numbers(&mut self, ids: &mut IdentifierSource) {
        self.item_sequence_number = ids.next_id();
        self.document_sequence_number = ids.next_id();
    }

    pub fn clear_scroll_point(&mut self) {
        self.scroll_point = ScrollOffset::default();
    }

    /// Keeps the body of POST requests so the item can be re-submitted.
    pub fn set_form_info_from_request(&mut self, request: Option<&ResourceRequest>) {
        match request {
            Some(request) if request.is_post() => {
                self.form_data = request.body.clone();
                self.form_content_type = request.http_content_type().map(str::to_owned);
            }
            _ => {
                self.form_data = None;
                self.form_content_type = None;
            }
        }
    }

    pub fn is_same_document_as(&self, other: &HistoryItem) -> bool {
        self.document_sequence_number == other.document_sequence_number
    }
}

/// Ordered session history of a page.
#[derive(Debug, Clone)]
pub struct BackForwardList {
    entries: Vec<HistoryItemHandle>,
    current: Option<usize>,
    capacity: usize,
}

impl BackForwardList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            capacity: capacity.max(1),
        }
    }

    /// Appends after the current entry, dropping any forward entries.
    pub fn add_item(&mut self, item: HistoryItemHandle) {
        if let Some(current) = self.current {
            if self
                .entries
                .get(current)
                .is_some_and(|existing| Rc::ptr_eq(existing, &item))
            {
                return;
            }
            self.entries.truncate(current + 1);
        }
        self.entries.push(item);
        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
        }
        self.current = Some(self.entries.len() - 1);
    }

    pub fn current_item(&self) -> Option<HistoryItemHandle> {
        self.current
            .and_then(|index| self.entries.get(index))
            .cloned()
    }

    pub fn item_at_offset(&self, offset: isize) -> Option<HistoryItemHandle> {
        let current = self.current?;
        let index = current.checked_add_signed(offset)?;
        self.entries.get(index).cloned()
    }

    /// Makes `item` current; false when it is not in the list.
    pub fn go_to_item(&mut self, item: &HistoryItemHandle) -> bool {
        match self.entries.iter().position(|entry| Rc::ptr_eq(entry, item)) {
            Some(index) => {
                self.current = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn back_list_count(&self) -> usize {
        self.current.unwrap_or(0)
    }

    pub fn forward_list_count(&self) -> usize {
        match self.current {
            Some(current) => self.entries.len() - current - 1,
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn urls(&self) -> Vec<Url> {
        self.entries
            .iter()
            .map(|entry| entry.borrow().url.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::BackForwardList;
    use super::HistoryItem;
    use super::HistoryItemHandle;
    use pd_core::IdentifierSource;
    use pd_net::FormData;
    use pd_net::HttpMethod;
    use pd_net::ResourceRequest;
    use url::Url;

    fn item(ids: &mut IdentifierSource, input: &str) -> HistoryItemHandle {
        let url = match Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        HistoryItem::new(url, ids).into_handle()
    }

    #[test]
    fn sequence_numbers_increase_across_items() {
        let mut ids = IdentifierSource::starting_after(100);
        let first = item(&mut ids, "http://a/1");
        let second = item(&mut ids, "http://a/2");
        assert!(second.borrow().item_sequence_number > first.borrow().item_sequence_number);
        assert!(second.borrow().document_sequence_number > first.borrow().document_sequence_number);
        assert!(!first.borrow().is_same_document_as(&second.borrow()));
    }

    #[test]
    fn adding_drops_forward_entries() {
        let mut ids = IdentifierSource::starting_after(0);
        let mut list = BackForwardList::new(10);
        let a = item(&mut ids, "http://a/1");
        let b = item(&mut ids, "http://a/2");
        let c = item(&mut ids, "http://a/3");
        list.add_item(a.clone());
        list.add_item(b);
        assert!(list.go_to_item(&a));
        assert_eq!(list.forward_list_count(), 1);

        list.add_item(c);
        assert_eq!(list.len(), 2);
        assert_eq!(list.back_list_count(), 1);
        assert_eq!(list.forward_list_count(), 0);
        assert_eq!(
            list.urls().iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["http://a/1", "http://a/3"]
        );
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut ids = IdentifierSource::starting_after(0);
        let mut list = BackForwardList::new(2);
        for index in 0..3 {
            list.add_item(item(&mut ids, &format!("http://a/{index}")));
        }
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.item_at_offset(-1).map(|entry| entry.borrow().url.to_string()),
            Some("http://a/1".to_owned())
        );
        assert!(list.item_at_offset(1).is_none());
    }

    #[test]
    fn keeps_post_body_for_resubmission() {
        let mut ids = IdentifierSource::starting_after(0);
        let handle = item(&mut ids, "http://a/form");
        let mut request = ResourceRequest::new(handle.borrow().url.clone());
        request.method = HttpMethod::Post;
        request.body = Some(FormData::from_bytes(b"q=1".to_vec()));
        request.set_http_content_type("application/x-www-form-urlencoded");

        handle.borrow_mut().set_form_info_from_request(Some(&request));
        assert_eq!(
            handle.borrow().form_content_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );

        handle.borrow_mut().set_form_info_from_request(None);
        assert!(handle.borrow().form_data.is_none());
    }
}
