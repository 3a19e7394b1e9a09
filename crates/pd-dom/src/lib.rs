//! Document and form models shared by the loader and its hosts.

pub mod document;
pub mod forms;

pub use document::ConsoleMessage;
pub use document::Document;
pub use document::DocumentId;
pub use document::LoadEventProgress;
pub use document::MessageLevel;
pub use document::PageDismissalType;
pub use document::ReadyState;
pub use forms::FormAttributes;
pub use forms::FormControl;
pub use forms::FormControlKind;
pub use forms::FormElement;
pub use forms::FormMethod;
pub use forms::FormSubmissionTrigger;
