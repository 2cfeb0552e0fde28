// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite columns and domain types.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`)
//! so lexical order matches chronological order in SQL comparisons.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde_json::Value;

use hostdesk_core::types::{Contact, Conversation, Escalation, Message};

pub(crate) const CONTACT_COLUMNS: &str = "id, tenant_id, channel, phone_number, external_id, \
     name, profile_picture_url, created_at, updated_at";

pub(crate) const CONVERSATION_COLUMNS: &str = "id, tenant_id, contact_id, status, priority, \
     assigned_to_id, hotel_unit, ia_locked, ia_locked_at, ia_locked_by, last_message_at, \
     closed_at, created_at, updated_at";

pub(crate) const MESSAGE_COLUMNS: &str = "id, tenant_id, conversation_id, external_message_id, \
     direction, type, content, metadata, status, timestamp, created_at";

pub(crate) const ESCALATION_COLUMNS: &str = "id, tenant_id, conversation_id, reason, \
     reason_detail, hotel_unit, status, priority, ai_context, attended_by_id, attended_at, \
     resolved_at, created_at, updated_at";

/// Current time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn opt_ts(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(ts)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn conversion_err(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

pub(crate) fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

pub(crate) fn get_json(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(Value::Null),
        Some(s) => serde_json::from_str(&s).map_err(|e| conversion_err(idx, e)),
    }
}

pub(crate) fn get_opt_json(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    get_json(row, idx).map(|v| if v.is_null() { None } else { Some(v) })
}

pub(crate) fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        channel: get_enum(row, 2)?,
        phone_number: row.get(3)?,
        external_id: row.get(4)?,
        name: row.get(5)?,
        profile_picture_url: row.get(6)?,
        created_at: get_ts(row, 7)?,
        updated_at: get_ts(row, 8)?,
    })
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        contact_id: row.get(2)?,
        status: get_enum(row, 3)?,
        priority: get_enum(row, 4)?,
        assigned_to_id: row.get(5)?,
        hotel_unit: row.get(6)?,
        ia_locked: row.get(7)?,
        ia_locked_at: get_opt_ts(row, 8)?,
        ia_locked_by: row.get(9)?,
        last_message_at: get_ts(row, 10)?,
        closed_at: get_opt_ts(row, 11)?,
        created_at: get_ts(row, 12)?,
        updated_at: get_ts(row, 13)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        conversation_id: row.get(2)?,
        external_message_id: row.get(3)?,
        direction: get_enum(row, 4)?,
        message_type: get_enum(row, 5)?,
        content: row.get(6)?,
        metadata: get_json(row, 7)?,
        status: get_enum(row, 8)?,
        timestamp: get_ts(row, 9)?,
        created_at: get_ts(row, 10)?,
    })
}

pub(crate) fn escalation_from_row(row: &Row<'_>) -> rusqlite::Result<Escalation> {
    Ok(Escalation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        conversation_id: row.get(2)?,
        reason: get_enum(row, 3)?,
        reason_detail: row.get(4)?,
        hotel_unit: row.get(5)?,
        status: get_enum(row, 6)?,
        priority: get_enum(row, 7)?,
        ai_context: get_opt_json(row, 8)?,
        attended_by_id: row.get(9)?,
        attended_at: get_opt_ts(row, 10)?,
        resolved_at: get_opt_ts(row, 11)?,
        created_at: get_ts(row, 12)?,
        updated_at: get_ts(row, 13)?,
    })
}
