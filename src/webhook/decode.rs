//! Body decoders for the two webhook endpoints.
//!
//! - [`decode_call_events`] reads the CloudEvents array posted to the call
//!   callback URL and keys every entry the way its waiter was registered
//!   (call leg id or operation context).
//! - [`decode_incoming_call`] reads the Event Grid array posted to the
//!   incoming-call endpoint: a subscription handshake or a ringing call.
//!
//! Unknown event types are skipped at `debug`. An entry missing its
//! correlation id is dropped at `warn`; the body is rejected only when no
//! entry survives.

use serde::Deserialize;

use crate::{
    call::{CallEvent, CallEventKind, DtmfTone, EventPayload, KeySpace, Participant},
    error::DecodeError,
};

const VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";
const INCOMING_CALL_EVENT: &str = "Microsoft.Communication.IncomingCall";

/// One CloudEvent posted to the call callback URL.
#[derive(Debug, Deserialize)]
struct CloudEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: CallEventData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallEventData {
    call_connection_id: Option<String>,
    operation_context: Option<String>,
    result_information: Option<ResultInformation>,
    collect_tones_result: Option<TonesResult>,
    dtmf_result: Option<TonesResult>,
    participant: Option<Identifier>,
}

#[derive(Debug, Deserialize)]
struct ResultInformation {
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TonesResult {
    #[serde(default)]
    tones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identifier {
    raw_id: String,
}

/// One Event Grid event posted to the incoming-call endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridEvent {
    event_type: String,
    #[serde(default)]
    data: GridData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    validation_code: Option<String>,
    incoming_call_context: Option<String>,
    from: Option<Identifier>,
}

/// What the incoming-call endpoint received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundNotice {
    /// Event Grid subscription handshake; echo `code` back.
    Validation { code: String },
    /// A call is ringing; answer it with `incoming_call_context`.
    IncomingCall {
        incoming_call_context: String,
        caller: Participant,
    },
}

/// Decodes a callback body into correlated call events.
///
/// Event types the core does not consume are skipped. Entries without their
/// correlation id are dropped; [`DecodeError::MissingField`] is returned only
/// when that leaves nothing decoded.
pub fn decode_call_events(body: &str) -> Result<Vec<CallEvent>, DecodeError> {
    let raw: Vec<CloudEvent> = serde_json::from_str(body)?;
    let mut out = Vec::with_capacity(raw.len());
    let mut missing = None;

    for ev in raw {
        let Some(kind) = CallEventKind::from_type(&ev.event_type) else {
            tracing::debug!(event_type = %ev.event_type, "skipping unhandled notification");
            continue;
        };
        let data = ev.data;
        let payload = payload_for(kind, &data);
        let correlated = CallEvent::correlate(
            kind,
            data.call_connection_id.as_deref(),
            data.operation_context.as_deref(),
            payload,
        );
        let Some(decoded) = correlated else {
            let field = match kind.key_space() {
                KeySpace::CallLeg => "callConnectionId",
                KeySpace::OperationContext => "operationContext",
            };
            tracing::warn!(
                event_type = %ev.event_type,
                field,
                "dropping notification without correlation id"
            );
            if missing.is_none() {
                missing = Some(DecodeError::MissingField {
                    event_type: ev.event_type,
                    field,
                });
            }
            continue;
        };
        out.push(decoded);
    }

    match missing {
        Some(err) if out.is_empty() => Err(err),
        _ => Ok(out),
    }
}

fn payload_for(kind: CallEventKind, data: &CallEventData) -> EventPayload {
    match kind {
        CallEventKind::RecognizeCompleted => {
            let tones = data
                .dtmf_result
                .as_ref()
                .or(data.collect_tones_result.as_ref())
                .map(|r| parse_tones(&r.tones))
                .unwrap_or_default();
            EventPayload::Tones(tones)
        }
        CallEventKind::RecognizeFailed
        | CallEventKind::PlayFailed
        | CallEventKind::AddParticipantFailed => match &data.result_information {
            Some(info) => EventPayload::Failure {
                code: info.code,
                message: info.message.clone(),
            },
            None => EventPayload::None,
        },
        CallEventKind::AddParticipantSucceeded => data
            .participant
            .as_ref()
            .map(|p| EventPayload::Participant(p.raw_id.clone()))
            .unwrap_or_default(),
        _ => EventPayload::None,
    }
}

fn parse_tones(raw: &[String]) -> Vec<DtmfTone> {
    raw.iter()
        .filter_map(|t| match t.parse::<DtmfTone>() {
            Ok(tone) => Some(tone),
            Err(e) => {
                tracing::warn!(tone = %e.0, "ignoring unrecognized tone");
                None
            }
        })
        .collect()
}

/// Decodes an incoming-call endpoint body.
///
/// The first validation or incoming-call entry wins.
pub fn decode_incoming_call(body: &str) -> Result<InboundNotice, DecodeError> {
    let raw: Vec<GridEvent> = serde_json::from_str(body)?;

    for ev in raw {
        match ev.event_type.as_str() {
            VALIDATION_EVENT => {
                let code = ev.data.validation_code.ok_or(DecodeError::MissingField {
                    event_type: ev.event_type,
                    field: "validationCode",
                })?;
                return Ok(InboundNotice::Validation { code });
            }
            INCOMING_CALL_EVENT => {
                let Some(incoming_call_context) = ev.data.incoming_call_context else {
                    return Err(DecodeError::MissingField {
                        event_type: ev.event_type,
                        field: "incomingCallContext",
                    });
                };
                let caller = ev
                    .data
                    .from
                    .map(|f| Participant::parse(&f.raw_id))
                    .ok_or(DecodeError::MissingField {
                        event_type: ev.event_type,
                        field: "from",
                    })?;
                return Ok(InboundNotice::IncomingCall {
                    incoming_call_context,
                    caller,
                });
            }
            other => tracing::debug!(event_type = other, "skipping event grid entry"),
        }
    }
    Err(DecodeError::Empty)
}
