//! OCPP 1.6 message handler
//!
//! Parses raw OCPP-J frames, dispatches the handful of actions the remote
//! authorization flow needs and serializes responses with `rust_ocpp::v1_6`
//! types. Every other action is answered with `NotImplemented`.

use chrono::Utc;
use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::messages::heart_beat::HeartbeatResponse;
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v1_6::types::{AuthorizationStatus, IdTagInfo, RegistrationStatus};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::SharedCentralSystem;
use crate::domain::IdTagStatus;
use crate::support::ocpp_frame::{ErrorCode, OcppFrame};

/// Handler for one charge point connection
pub struct OcppHandler {
    pub charge_point_id: String,
    central: SharedCentralSystem,
    heartbeat_interval: u32,
}

impl OcppHandler {
    pub fn new(
        charge_point_id: impl Into<String>,
        central: SharedCentralSystem,
        heartbeat_interval: u32,
    ) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            central,
            heartbeat_interval,
        }
    }

    /// Handle one text message. Returns the serialized reply, if any.
    pub async fn handle(&self, text: &str) -> Option<String> {
        let frame = match OcppFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    error = %e,
                    raw = text,
                    "Failed to parse OCPP message"
                );
                return None;
            }
        };

        match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => Some(self.handle_call(unique_id, &action, payload).serialize()),
            OcppFrame::CallResult { unique_id, .. } => {
                debug!(
                    charge_point_id = self.charge_point_id.as_str(),
                    unique_id = unique_id.as_str(),
                    "Ignoring unsolicited CallResult"
                );
                None
            }
            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            } => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    unique_id = unique_id.as_str(),
                    error_code = error_code.as_str(),
                    "CallError received: {}",
                    error_description
                );
                None
            }
        }
    }

    fn handle_call(&self, unique_id: String, action: &str, payload: Value) -> OcppFrame {
        let result = match action {
            "BootNotification" => self.boot_notification(payload),
            "Heartbeat" => self.heartbeat(),
            "Authorize" => self.authorize(payload),
            "StatusNotification" => self.status_notification(payload),
            other => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    action = other,
                    "Unsupported action"
                );
                return OcppFrame::error_response(
                    unique_id,
                    ErrorCode::NotImplemented,
                    format!("Action '{}' is not supported", other),
                );
            }
        };

        match result {
            Ok(payload) => OcppFrame::CallResult { unique_id, payload },
            Err(e) => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    action,
                    error = %e,
                    "Malformed payload"
                );
                OcppFrame::error_response(unique_id, ErrorCode::FormationViolation, e.to_string())
            }
        }
    }

    fn boot_notification(&self, payload: Value) -> serde_json::Result<Value> {
        let req: BootNotificationRequest = serde_json::from_value(payload)?;
        info!(
            charge_point_id = self.charge_point_id.as_str(),
            vendor = req.charge_point_vendor.as_str(),
            model = req.charge_point_model.as_str(),
            "BootNotification"
        );

        self.central.charge_point_booted(&self.charge_point_id);

        serde_json::to_value(&BootNotificationResponse {
            current_time: Utc::now(),
            interval: self.heartbeat_interval,
            status: RegistrationStatus::Accepted,
        })
    }

    fn heartbeat(&self) -> serde_json::Result<Value> {
        debug!(charge_point_id = self.charge_point_id.as_str(), "Heartbeat");
        self.central.sessions().touch(&self.charge_point_id);
        serde_json::to_value(&HeartbeatResponse {
            current_time: Utc::now(),
        })
    }

    fn authorize(&self, payload: Value) -> serde_json::Result<Value> {
        let req: AuthorizeRequest = serde_json::from_value(payload)?;
        let status = self
            .central
            .get_authorization_status(&self.charge_point_id, &req.id_tag);

        info!(
            charge_point_id = self.charge_point_id.as_str(),
            id_tag = req.id_tag.as_str(),
            %status,
            "Authorize"
        );

        serde_json::to_value(&AuthorizeResponse {
            id_tag_info: IdTagInfo {
                status: to_ocpp_status(status),
                expiry_date: None,
                parent_id_tag: None,
            },
        })
    }

    fn status_notification(&self, payload: Value) -> serde_json::Result<Value> {
        let req: StatusNotificationRequest = serde_json::from_value(payload)?;
        debug!(
            charge_point_id = self.charge_point_id.as_str(),
            connector_id = req.connector_id,
            status = ?req.status,
            "StatusNotification"
        );
        serde_json::to_value(&StatusNotificationResponse {})
    }
}

fn to_ocpp_status(status: IdTagStatus) -> AuthorizationStatus {
    match status {
        IdTagStatus::Accepted => AuthorizationStatus::Accepted,
        IdTagStatus::Blocked => AuthorizationStatus::Blocked,
        IdTagStatus::Expired => AuthorizationStatus::Expired,
        IdTagStatus::Invalid => AuthorizationStatus::Invalid,
        IdTagStatus::ConcurrentTx => AuthorizationStatus::ConcurrentTx,
    }
}
