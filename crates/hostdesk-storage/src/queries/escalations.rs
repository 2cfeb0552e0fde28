// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalation creation, status updates and reporting.

use std::collections::BTreeMap;

use hostdesk_core::HostdeskError;
use hostdesk_core::traits::EscalationFilter;
use hostdesk_core::types::{
    ConversationStatus, Direction, Escalation, EscalationOutcome, EscalationRequest,
    EscalationStats, EscalationStatus, LockOwner, MessageStatus, MessageType, NewMessage,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value, json};

use crate::database::{Database, map_tr_err};
use crate::models::{ESCALATION_COLUMNS, escalation_from_row, new_id, now, opt_ts, ts};
use crate::queries::{contacts, conversations, messages};

/// Metadata marker on messages imported with an escalation.
pub const IMPORTED_FROM: &str = "escalation";

fn select(conn: &Connection, tenant_id: &str, id: &str) -> rusqlite::Result<Option<Escalation>> {
    conn.query_row(
        &format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?1 AND tenant_id = ?2"),
        params![id, tenant_id],
        escalation_from_row,
    )
    .optional()
}

/// The AI context stored on the escalation: the transcript plus whatever
/// context object the caller supplied.
fn merged_ai_context(request: &EscalationRequest) -> Option<Value> {
    if request.message_history.is_empty() && request.ai_context.is_none() {
        return None;
    }
    let mut merged = Map::new();
    if !request.message_history.is_empty() {
        merged.insert("messageHistory".into(), json!(request.message_history));
    }
    match &request.ai_context {
        Some(Value::Object(extra)) => {
            for (k, v) in extra {
                merged.insert(k.clone(), v.clone());
            }
        }
        Some(other) => {
            merged.insert("context".into(), other.clone());
        }
        None => {}
    }
    Some(Value::Object(merged))
}

/// Contact, conversation lock, history import and escalation row in one
/// transaction.
pub async fn create(
    db: &Database,
    request: EscalationRequest,
) -> Result<EscalationOutcome, HostdeskError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now();

            let contact = contacts::upsert(
                &tx,
                &request.tenant_id,
                &request.contact_phone_number,
                request.contact_name.as_deref(),
            )?;

            let (mut conversation, conversation_created) =
                conversations::find_or_create_active_in(
                    &tx,
                    &request.tenant_id,
                    &contact.id,
                    ConversationStatus::Open,
                )?;
            conversation.status = ConversationStatus::Open;
            conversation.priority = request.priority;
            conversation.ia_locked = true;
            conversation.ia_locked_at = Some(now);
            conversation.ia_locked_by = Some(LockOwner::System.as_str().to_string());
            if request.hotel_unit.is_some() {
                conversation.hotel_unit = request.hotel_unit.clone();
            }
            conversation.last_message_at = now;
            conversation.updated_at = now;
            conversations::store(&tx, &conversation)?;

            let escalation = Escalation {
                id: new_id(),
                tenant_id: request.tenant_id.clone(),
                conversation_id: conversation.id.clone(),
                reason: request.reason,
                reason_detail: request.reason_detail.clone(),
                hotel_unit: request.hotel_unit.clone(),
                status: EscalationStatus::Pending,
                priority: request.priority,
                ai_context: merged_ai_context(&request),
                attended_by_id: None,
                attended_at: None,
                resolved_at: None,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                &format!(
                    "INSERT INTO escalations ({ESCALATION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL, ?10, ?10)"
                ),
                params![
                    escalation.id,
                    escalation.tenant_id,
                    escalation.conversation_id,
                    escalation.reason.to_string(),
                    escalation.reason_detail,
                    escalation.hotel_unit,
                    escalation.status.to_string(),
                    escalation.priority.to_string(),
                    escalation.ai_context.as_ref().map(Value::to_string),
                    ts(&now),
                ],
            )?;

            // Entries without a timestamp are spaced one second apart, ending now.
            let total = request.message_history.len() as i64;
            for (index, entry) in request.message_history.iter().enumerate() {
                let timestamp = entry.timestamp.unwrap_or_else(|| {
                    now - chrono::Duration::seconds(total - index as i64)
                });
                messages::insert_in(
                    &tx,
                    NewMessage {
                        tenant_id: request.tenant_id.clone(),
                        conversation_id: conversation.id.clone(),
                        external_message_id: None,
                        direction: if entry.role == "user" {
                            Direction::Inbound
                        } else {
                            Direction::Outbound
                        },
                        message_type: MessageType::Text,
                        content: entry.content.clone(),
                        metadata: json!({
                            "importedFrom": IMPORTED_FROM,
                            "originalRole": entry.role,
                        }),
                        status: MessageStatus::Delivered,
                        timestamp,
                    },
                )?;
            }

            tx.commit()?;
            Ok(EscalationOutcome {
                contact,
                conversation,
                conversation_created,
                escalation,
                imported_messages: request.message_history.len(),
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(
    db: &Database,
    tenant_id: &str,
    escalation_id: &str,
) -> Result<Option<Escalation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let escalation_id = escalation_id.to_string();
    db.connection()
        .call(move |conn| select(conn, &tenant_id, &escalation_id))
        .await
        .map_err(map_tr_err)
}

/// `IN_PROGRESS` with an attendant stamps `attended_*`; `RESOLVED` and
/// `CANCELLED` stamp `resolved_at`.
pub async fn update_status(
    db: &Database,
    tenant_id: &str,
    escalation_id: &str,
    status: EscalationStatus,
    attended_by_id: Option<&str>,
) -> Result<Option<Escalation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let escalation_id = escalation_id.to_string();
    let attended_by_id = attended_by_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut escalation) = select(&tx, &tenant_id, &escalation_id)? else {
                return Ok(None);
            };
            let now = now();
            escalation.status = status;
            if status == EscalationStatus::InProgress
                && let Some(user) = attended_by_id
            {
                escalation.attended_by_id = Some(user);
                escalation.attended_at = Some(now);
            }
            if status.is_closed() {
                escalation.resolved_at = Some(now);
            }
            escalation.updated_at = now;
            tx.execute(
                "UPDATE escalations SET status = ?1, attended_by_id = ?2, attended_at = ?3, \
                 resolved_at = ?4, updated_at = ?5 WHERE id = ?6 AND tenant_id = ?7",
                params![
                    escalation.status.to_string(),
                    escalation.attended_by_id,
                    opt_ts(&escalation.attended_at),
                    opt_ts(&escalation.resolved_at),
                    ts(&now),
                    escalation.id,
                    escalation.tenant_id,
                ],
            )?;
            tx.commit()?;
            Ok(Some(escalation))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list(
    db: &Database,
    tenant_id: &str,
    filter: EscalationFilter,
) -> Result<Vec<Escalation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut sql = format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE tenant_id = ?");
            let mut args: Vec<SqlValue> = vec![SqlValue::Text(tenant_id)];
            if let Some(status) = filter.status {
                sql.push_str(" AND status = ?");
                args.push(SqlValue::Text(status.to_string()));
            }
            if let Some(unit) = filter.hotel_unit {
                sql.push_str(" AND hotel_unit = ?");
                args.push(SqlValue::Text(unit));
            }
            sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");
            args.push(SqlValue::Integer(i64::from(filter.limit.unwrap_or(20).min(100))));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), escalation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn stats(db: &Database, tenant_id: &str) -> Result<EscalationStats, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let group = |column: &str| -> rusqlite::Result<BTreeMap<String, u64>> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {column}, COUNT(*) FROM escalations \
                     WHERE tenant_id = ?1 AND {column} IS NOT NULL GROUP BY {column}"
                ))?;
                let rows = stmt.query_map(params![tenant_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?;
                rows.collect()
            };

            let mut by_status: BTreeMap<String, u64> = [
                EscalationStatus::Pending,
                EscalationStatus::InProgress,
                EscalationStatus::Resolved,
                EscalationStatus::Cancelled,
            ]
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
            by_status.extend(group("status")?);
            let by_reason = group("reason")?;
            let by_hotel_unit = group("hotel_unit")?;
            let total = by_status.values().sum();

            Ok(EscalationStats {
                total,
                by_status,
                by_reason,
                by_hotel_unit,
            })
        })
        .await
        .map_err(map_tr_err)
}
