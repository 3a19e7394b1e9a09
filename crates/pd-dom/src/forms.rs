//! Form elements and the controls that contribute submission entries.

use pd_net::FormDataList;
use pd_net::FormEncodingType;

/// Whether a submission was started by script or by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSubmissionTrigger {
    SubmittedByJavaScript,
    NotSubmittedByJavaScript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMethod {
    #[default]
    Get,
    Post,
    Dialog,
}

impl FormMethod {
    /// `dialog` is only recognized when the dialog element is enabled.
    pub fn parse(value: &str, dialog_enabled: bool) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("post") {
            Self::Post
        } else if dialog_enabled && value.eq_ignore_ascii_case("dialog") {
            Self::Dialog
        } else {
            Self::Get
        }
    }
}

/// Submission-relevant attributes of a form or of a submitter override.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormAttributes {
    pub action: String,
    pub method: String,
    pub target: String,
    pub enctype: String,
    pub accept_charset: String,
}

impl FormAttributes {
    pub fn method(&self, dialog_enabled: bool) -> FormMethod {
        FormMethod::parse(&self.method, dialog_enabled)
    }

    pub fn encoding_type(&self) -> FormEncodingType {
        FormEncodingType::parse(&self.enctype)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormControlKind {
    Text,
    Password,
    Hidden,
    Checkbox,
    Radio,
    Submit,
    TextArea,
    Select,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl {
    pub name: String,
    pub kind: FormControlKind,
    pub value: String,
    pub checked: bool,
    pub disabled: bool,
    pub form_action: Option<String>,
    pub form_method: Option<String>,
    pub form_enctype: Option<String>,
    pub form_target: Option<String>,
}

impl FormControl {
    pub fn new(kind: FormControlKind, name: &str, value: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            value: value.to_owned(),
            checked: false,
            disabled: false,
            form_action: None,
            form_method: None,
            form_enctype: None,
            form_target: None,
        }
    }

    pub fn is_submit_button(&self) -> bool {
        self.kind == FormControlKind::Submit
    }

    /// Appends this control's entries; returns false when it contributes nothing.
    ///
    /// A submit button only contributes when it is the submitter.
    pub fn append_form_data(&self, list: &mut FormDataList, is_submitter: bool) -> bool {
        if self.disabled || self.name.is_empty() {
            return false;
        }

        match self.kind {
            FormControlKind::Submit if !is_submitter => false,
            FormControlKind::Checkbox | FormControlKind::Radio if !self.checked => false,
            FormControlKind::File => {
                list.append_file(&self.name, &self.value, "application/octet-stream");
                true
            }
            _ => {
                list.append_text(&self.name, &self.value);
                true
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormElement {
    pub attributes: FormAttributes,
    pub controls: Vec<FormControl>,
}

impl FormElement {
    pub fn new(attributes: FormAttributes) -> Self {
        Self {
            attributes,
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: FormControl) -> Self {
        self.controls.push(control);
        self
    }

    pub fn save_state(&self) -> Vec<String> {
        self.controls
            .iter()
            .map(|control| control.value.clone())
            .collect()
    }

    pub fn restore_state<'a>(&mut self, values: &mut impl Iterator<Item = &'a String>) {
        for control in &mut self.controls {
            match values.next() {
                Some(value) => control.value.clone_from(value),
                None => return,
            }
        }
    }
}
