//! Frame loading: navigation, commit, completion and session history.
//!
//! An [`Engine`] owns every page, frame and document loader. Embedders drive
//! it through [`FrameLoaderClient`] and [`DocumentHost`] callouts and feed
//! network events back in by [`DocumentLoaderId`].

pub mod application_cache;
pub mod client;
mod commit;
mod completion;
pub mod document_loader;
pub mod engine;
pub mod form_submission;
pub mod frame;
mod frame_tree;
pub mod history;
mod history_navigation;
pub mod ids;
pub mod load_request;
mod main_resource;
mod navigation;
pub mod navigation_policy;
pub mod page;
mod same_document;
pub mod scheduler;
pub mod settings;
pub mod state_machine;
mod targeting;
mod teardown;
pub mod types;
mod view_state;

pub use application_cache::ApplicationCacheHost;
pub use application_cache::ManifestSelection;
pub use application_cache::NoopApplicationCacheHost;
pub use client::DocumentHost;
pub use client::FrameLoaderClient;
pub use client::InertDocumentHost;
pub use client::JavaScriptUrlOutcome;
pub use document_loader::DocumentLoader;
pub use engine::Engine;
pub use form_submission::FormSubmission;
pub use form_submission::FormSubmissionOutcome;
pub use frame::Frame;
pub use frame::FrameLoader;
pub use frame::FrameOwner;
pub use frame::FrameOwnerKind;
pub use frame::FrameView;
pub use history::BackForwardList;
pub use history::HistoryItem;
pub use history::HistoryItemHandle;
pub use ids::DocumentLoaderId;
pub use ids::FrameId;
pub use ids::PageId;
pub use load_request::FormState;
pub use load_request::FrameLoadRequest;
pub use load_request::Modifiers;
pub use load_request::MouseButton;
pub use load_request::OriginDocument;
pub use load_request::SubstituteData;
pub use load_request::TriggeringEvent;
pub use navigation_policy::NavigationAction;
pub use navigation_policy::NavigationPolicy;
pub use navigation_policy::NavigationType;
pub use page::Page;
pub use scheduler::NavigationScheduler;
pub use settings::LoaderSettings;
pub use state_machine::FrameLoaderStateMachine;
pub use state_machine::LoaderMilestone;
pub use types::ClientRedirectPolicy;
pub use types::FrameLoadType;
pub use types::FrameState;
pub use types::HistoryCommitType;
pub use types::HistoryLoadType;
pub use types::ReloadPolicy;
pub use types::ScrollOffset;
pub use types::UpdateBackForwardListPolicy;

#[cfg(test)]
mod tests;
