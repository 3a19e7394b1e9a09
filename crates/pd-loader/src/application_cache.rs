//! Application cache hooks invoked while a document's main resource loads.

use pd_net::ResourceRequest;
use pd_net::ResourceResponse;
use url::Url;

/// Answer to a document declaring a cache manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSelection {
    Continue,
    /// The document was served from a cache it does not belong to and must be loaded again.
    RestartNavigation,
}

pub trait ApplicationCacheHost {
    fn will_start_loading_main_resource(&self, _request: &mut ResourceRequest) {}

    fn select_cache_with_manifest(&self, _manifest_url: &Url) -> ManifestSelection {
        ManifestSelection::Continue
    }

    fn did_receive_response_for_main_resource(&self, _response: &ResourceResponse) {}

    fn main_resource_data_received(&self, _data: &[u8]) {}

    fn finished_loading_main_resource(&self) {}

    fn failed_loading_main_resource(&self) {}

    /// Called once when the owning document loader leaves its frame.
    fn dispose(&self) {}
}

/// Host used when the embedder provides no application cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopApplicationCacheHost;

impl ApplicationCacheHost for NoopApplicationCacheHost {}
