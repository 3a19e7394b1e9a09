//! Turning a submitted form into a navigation request.

use crate::ids::FrameId;
use crate::load_request::FormState;
use crate::load_request::FrameLoadRequest;
use crate::load_request::OriginDocument;
use crate::load_request::TriggeringEvent;
use encoding_rs::UTF_8;
use pd_core::BrowserResult;
use pd_core::IdentifierSource;
use pd_dom::Document;
use pd_dom::FormControlKind;
use pd_dom::FormElement;
use pd_dom::FormMethod;
use pd_dom::FormSubmissionTrigger;
use pd_net::FormData;
use pd_net::FormDataList;
use pd_net::FormEncodingType;
use pd_net::HttpMethod;
use pd_net::ResourceRequest;
use pd_net::form_data::encode_string_as_form_data;
use pd_net::form_data::encoding_from_accept_charset;
use pd_net::url::protocol_is;
use pd_privacy::PrivacyPolicy;
use percent_encoding::percent_decode_str;
use url::Url;

/// Result of building a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmissionOutcome {
    /// `method=dialog`: close the enclosing dialog with this return value.
    CloseDialog(String),
    Submit(FormSubmission),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    method: FormMethod,
    action: Url,
    target: String,
    encoding_type: FormEncodingType,
    state: FormState,
    form_data: FormData,
    boundary: Option<String>,
    event: Option<TriggeringEvent>,
    referrer: Option<String>,
    origin: String,
}

impl FormSubmission {
    /// Builds the submission for `form` in `document`.
    ///
    /// `submitter` indexes the control that submitted the form; its
    /// `formaction`, `formenctype`, `formmethod` and `formtarget` override the
    /// form's own attributes.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        form: &FormElement,
        submitter: Option<usize>,
        document: &Document,
        frame: FrameId,
        trigger: FormSubmissionTrigger,
        event: Option<TriggeringEvent>,
        dialog_enabled: bool,
        ids: &mut IdentifierSource,
    ) -> BrowserResult<FormSubmissionOutcome> {
        let submit_button = submitter
            .and_then(|index| form.controls.get(index))
            .filter(|control| control.is_submit_button());

        let mut attributes = form.attributes.clone();
        if let Some(button) = submit_button {
            if let Some(action) = &button.form_action {
                attributes.action = action.trim().to_owned();
            }
            if let Some(enctype) = &button.form_enctype {
                attributes.enctype.clone_from(enctype);
            }
            if let Some(method) = &button.form_method {
                attributes.method.clone_from(method);
            }
            if let Some(target) = &button.form_target {
                attributes.target.clone_from(target);
            }
        }

        let method = attributes.method(dialog_enabled);
        if method == FormMethod::Dialog {
            let result = submit_button
                .map(|button| button.value.clone())
                .unwrap_or_default();
            return Ok(FormSubmissionOutcome::CloseDialog(result));
        }

        let mut action = document.complete_url(attributes.action.trim())?;
        let is_mailto = protocol_is(&action, "mailto");
        let mut encoding_type = attributes.encoding_type();
        let mut is_multipart = false;
        if method == FormMethod::Post {
            is_multipart = encoding_type == FormEncodingType::Multipart;
            if is_multipart && is_mailto {
                encoding_type = FormEncodingType::UrlEncoded;
                is_multipart = false;
            }
        }

        let data_encoding = if is_mailto {
            UTF_8
        } else {
            encoding_from_accept_charset(&attributes.accept_charset, Some(document.encoding), None)
        };
        let mut entries = FormDataList::new(data_encoding);
        let mut contains_password_data = false;
        for (index, control) in form.controls.iter().enumerate() {
            control.append_form_data(&mut entries, Some(index) == submitter);
            if control.kind == FormControlKind::Password && !control.value.is_empty() {
                contains_password_data = true;
            }
        }

        let identifier = ids.next_id();
        let mut boundary = None;
        let mut form_data = if is_multipart {
            let form_data = entries.to_multipart_form_data(identifier);
            boundary = form_data.boundary().map(str::to_owned);
            form_data
        } else {
            let body_encoding = if method == FormMethod::Get {
                FormEncodingType::UrlEncoded
            } else {
                encoding_type
            };
            let form_data = entries.to_form_data(body_encoding);
            if method == FormMethod::Post && is_mailto {
                append_mailto_post_form_data_to_url(&mut action, &form_data, encoding_type);
                FormData::new()
            } else {
                form_data
            }
        };
        form_data.set_identifier(identifier);
        form_data.set_contains_password_data(contains_password_data);

        let target = if attributes.target.is_empty() {
            document.base_target.clone()
        } else {
            attributes.target
        };

        Ok(FormSubmissionOutcome::Submit(Self {
            method,
            action,
            target,
            encoding_type,
            state: FormState {
                form: form.clone(),
                source_document: OriginDocument::capture(frame, document),
                trigger,
            },
            form_data,
            boundary,
            event,
            referrer: None,
            origin: document.security_origin.to_header_value(),
        }))
    }

    pub fn method(&self) -> FormMethod {
        self.method
    }

    pub fn action(&self) -> &Url {
        &self.action
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: &str) {
        self.target = target.to_owned();
    }

    pub fn content_type(&self) -> String {
        match &self.boundary {
            Some(boundary) => format!("{}; boundary={boundary}", self.encoding_type.as_str()),
            None => self.encoding_type.as_str().to_owned(),
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn form_data(&self) -> &FormData {
        &self.form_data
    }

    pub fn event(&self) -> Option<TriggeringEvent> {
        self.event
    }

    pub fn set_referrer(&mut self, referrer: Option<String>) {
        self.referrer = referrer;
    }

    /// GET submissions carry the form data as the query string.
    pub fn request_url(&self) -> Url {
        if self.method == FormMethod::Post {
            return self.action.clone();
        }
        let mut url = self.action.clone();
        url.set_query(Some(&self.form_data.flatten_to_string()));
        url
    }

    pub fn populate_frame_load_request(&self, request: &mut FrameLoadRequest, privacy: &PrivacyPolicy) {
        if !self.target.is_empty() {
            request.frame_name.clone_from(&self.target);
        }
        if let Some(referrer) = &self.referrer {
            request.resource_request.set_http_referrer(referrer);
        }
        if self.method == FormMethod::Post {
            request.resource_request.method = HttpMethod::Post;
            request.resource_request.body = Some(self.form_data.clone());
            request
                .resource_request
                .set_http_content_type(&self.content_type());
        }
        request.resource_request.url = self.request_url();
        privacy.add_http_origin_if_needed(&mut request.resource_request, &self.origin);
    }

    /// The navigation request that submits this form.
    pub fn frame_load_request(&self, privacy: &PrivacyPolicy) -> FrameLoadRequest {
        let mut request = FrameLoadRequest::new(
            Some(self.state.source_document.clone()),
            ResourceRequest::new(self.action.clone()),
        );
        self.populate_frame_load_request(&mut request, privacy);
        request.triggering_event = self.event;
        request.form_state = Some(self.state.clone());
        request
    }
}

// Mail clients expect the body in the query; text/plain bodies are unescaped into lines.
fn append_mailto_post_form_data_to_url(url: &mut Url, data: &FormData, encoding_type: FormEncodingType) {
    let mut body = data.flatten_to_string();
    if encoding_type == FormEncodingType::TextPlain {
        let lines = format!("{}\r\n", body.replace('&', "\r\n").replace('+', " "));
        body = percent_decode_str(&lines).decode_utf8_lossy().into_owned();
    }

    let mut encoded = b"body=".to_vec();
    encode_string_as_form_data(&mut encoded, body.as_bytes());
    let encoded = String::from_utf8_lossy(&encoded).replace('+', "%20");

    let mut query = url.query().unwrap_or_default().to_owned();
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(&encoded);
    url.set_query(Some(&query));
}
