//! Serialization of a run configuration into the outbound multipart request.

use bench_common::{BenchError, BenchResult, RunConfig, RunRequestWire, ServiceModel};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

/// Name of the multipart part carrying the JSON configuration.
pub const CONFIG_PART: &str = "config";

/// One binary file sent alongside the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Part name, `image_{index}`
    pub name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A fully serialized run submission.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub config: RunRequestWire,
    /// `config` encoded as JSON
    pub config_json: String,
    pub attachments: Vec<AttachmentPart>,
}

impl OutboundRequest {
    pub fn attachment(&self, name: &str) -> Option<&AttachmentPart> {
        self.attachments.iter().find(|a| a.name == name)
    }

    /// Total size of all attachment bytes.
    pub fn attachment_bytes(&self) -> usize {
        self.attachments.iter().map(|a| a.bytes.len()).sum()
    }

    /// Convert into a multipart form: the `config` part first, then one part
    /// per attachment in service order.
    pub fn into_form(self) -> BenchResult<Form> {
        let config = Part::text(self.config_json)
            .mime_str("application/json")
            .map_err(|e| BenchError::Internal(format!("invalid config part: {}", e)))?;
        let mut form = Form::new().part(CONFIG_PART, config);

        for attachment in self.attachments {
            let part = Part::bytes(attachment.bytes.to_vec())
                .file_name(attachment.file_name)
                .mime_str(&attachment.content_type)
                .map_err(|e| {
                    BenchError::Internal(format!(
                        "invalid content type for {}: {}",
                        attachment.name, e
                    ))
                })?;
            form = form.part(attachment.name, part);
        }

        Ok(form)
    }
}

/// Turns a RunConfig into an [`OutboundRequest`].
pub struct RequestBuilder;

impl RequestBuilder {
    /// Serialize `config`.
    ///
    /// Image services carrying a file reference it as `image_{index}`, with
    /// `index` the service's position, and the bytes travel as a part of that
    /// name. The output depends only on the input.
    pub fn build(config: &RunConfig) -> BenchResult<OutboundRequest> {
        let mut services = Vec::with_capacity(config.services.len());
        let mut attachments = Vec::new();

        for (index, service) in config.services.iter().enumerate() {
            let wire = service.to_wire_shape(index)?;

            if let Some(file) = service.active_attachment() {
                attachments.push(AttachmentPart {
                    name: ServiceModel::attachment_key(index),
                    file_name: file.file_name.clone(),
                    content_type: file.content_type.clone(),
                    bytes: file.bytes.clone(),
                });
            }
            services.push(wire);
        }

        let wire = RunRequestWire {
            services,
            concurrent_users: config.concurrency_levels.to_vec(),
            requests_per_user: config.requests_per_user,
        };
        let config_json = serde_json::to_string(&wire)
            .map_err(|e| BenchError::Internal(format!("failed to encode run config: {}", e)))?;

        Ok(OutboundRequest {
            config: wire,
            config_json,
            attachments,
        })
    }
}
