// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup, creation and partial updates.

use chrono::{DateTime, Utc};
use hostdesk_core::HostdeskError;
use hostdesk_core::types::{
    Conversation, ConversationPatch, ConversationStatus, IaLockChange, LOCKED_BY_FOLLOWUP,
    Priority,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{CONVERSATION_COLUMNS, conversation_from_row, new_id, now, opt_ts, ts};

const ACTIVE_FILTER: &str = "status IN ('BOT_HANDLING', 'OPEN', 'IN_PROGRESS', 'WAITING')";

pub(crate) fn select(
    conn: &Connection,
    tenant_id: &str,
    conversation_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1 AND tenant_id = ?2"),
        params![conversation_id, tenant_id],
        conversation_from_row,
    )
    .optional()
}

pub(crate) fn select_active(
    conn: &Connection,
    tenant_id: &str,
    contact_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE tenant_id = ?1 AND contact_id = ?2 AND {ACTIVE_FILTER} \
             ORDER BY last_message_at DESC LIMIT 1"
        ),
        params![tenant_id, contact_id],
        conversation_from_row,
    )
    .optional()
}

pub(crate) fn insert(conn: &Connection, conversation: &Conversation) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO conversations ({CONVERSATION_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            conversation.id,
            conversation.tenant_id,
            conversation.contact_id,
            conversation.status.to_string(),
            conversation.priority.to_string(),
            conversation.assigned_to_id,
            conversation.hotel_unit,
            conversation.ia_locked,
            opt_ts(&conversation.ia_locked_at),
            conversation.ia_locked_by,
            ts(&conversation.last_message_at),
            opt_ts(&conversation.closed_at),
            ts(&conversation.created_at),
            ts(&conversation.updated_at),
        ],
    )?;
    Ok(())
}

/// Writes every mutable column of `conversation` back.
pub(crate) fn store(conn: &Connection, conversation: &Conversation) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE conversations SET status = ?1, priority = ?2, assigned_to_id = ?3, \
         hotel_unit = ?4, ia_locked = ?5, ia_locked_at = ?6, ia_locked_by = ?7, \
         last_message_at = ?8, closed_at = ?9, updated_at = ?10 \
         WHERE id = ?11 AND tenant_id = ?12",
        params![
            conversation.status.to_string(),
            conversation.priority.to_string(),
            conversation.assigned_to_id,
            conversation.hotel_unit,
            conversation.ia_locked,
            opt_ts(&conversation.ia_locked_at),
            conversation.ia_locked_by,
            ts(&conversation.last_message_at),
            opt_ts(&conversation.closed_at),
            ts(&conversation.updated_at),
            conversation.id,
            conversation.tenant_id,
        ],
    )?;
    Ok(())
}

/// A fresh conversation for a contact.
pub(crate) fn new_conversation(
    tenant_id: &str,
    contact_id: &str,
    status: ConversationStatus,
    at: DateTime<Utc>,
) -> Conversation {
    Conversation {
        id: new_id(),
        tenant_id: tenant_id.to_string(),
        contact_id: contact_id.to_string(),
        status,
        priority: Priority::Medium,
        assigned_to_id: None,
        hotel_unit: None,
        ia_locked: false,
        ia_locked_at: None,
        ia_locked_by: None,
        last_message_at: at,
        closed_at: None,
        created_at: at,
        updated_at: at,
    }
}

/// Returns the active conversation or inserts a new one in `initial`. Runs
/// on the single writer, so the check and the insert cannot interleave with
/// another caller; the unique partial index backs this up.
pub(crate) fn find_or_create_active_in(
    conn: &Connection,
    tenant_id: &str,
    contact_id: &str,
    initial: ConversationStatus,
) -> rusqlite::Result<(Conversation, bool)> {
    if let Some(existing) = select_active(conn, tenant_id, contact_id)? {
        return Ok((existing, false));
    }
    let conversation = new_conversation(tenant_id, contact_id, initial, now());
    insert(conn, &conversation)?;
    Ok((conversation, true))
}

/// Applies `patch` to an in-memory snapshot.
pub(crate) fn apply_patch(conversation: &mut Conversation, patch: ConversationPatch, at: DateTime<Utc>) {
    if let Some(status) = patch.status {
        if status == ConversationStatus::Closed && conversation.status != ConversationStatus::Closed {
            conversation.closed_at = Some(at);
        } else if status.is_active() {
            conversation.closed_at = None;
        }
        conversation.status = status;
    }
    if let Some(priority) = patch.priority {
        conversation.priority = priority;
    }
    if let Some(unit) = patch.hotel_unit {
        conversation.hotel_unit = Some(unit);
    }
    if let Some(last) = patch.last_message_at {
        conversation.last_message_at = last;
    }
    match patch.ia_lock {
        Some(IaLockChange::Lock { by, at: locked_at }) => {
            conversation.ia_locked = true;
            conversation.ia_locked_at = Some(locked_at);
            conversation.ia_locked_by = Some(by.as_str().to_string());
        }
        Some(IaLockChange::Unlock) => {
            conversation.ia_locked = false;
            conversation.ia_locked_at = None;
            conversation.ia_locked_by = None;
        }
        None => {}
    }
    conversation.updated_at = at;
}

pub async fn get(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
) -> Result<Option<Conversation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| select(conn, &tenant_id, &conversation_id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_active(
    db: &Database,
    tenant_id: &str,
    contact_id: &str,
) -> Result<Option<Conversation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| select_active(conn, &tenant_id, &contact_id))
        .await
        .map_err(map_tr_err)
}

pub async fn find_or_create_active(
    db: &Database,
    tenant_id: &str,
    contact_id: &str,
    initial: ConversationStatus,
) -> Result<(Conversation, bool), HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let result = find_or_create_active_in(&tx, &tenant_id, &contact_id, initial)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Returns `None` when the conversation does not exist for the tenant.
pub async fn update(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
    patch: ConversationPatch,
) -> Result<Option<Conversation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut conversation) = select(&tx, &tenant_id, &conversation_id)? else {
                return Ok(None);
            };
            apply_patch(&mut conversation, patch, now());
            store(&tx, &conversation)?;
            tx.commit()?;
            Ok(Some(conversation))
        })
        .await
        .map_err(map_tr_err)
}

/// Compare-and-set release of a follow-up lock. The guard is evaluated by the
/// `UPDATE` itself, so a lock taken over in the meantime is left alone.
pub async fn release_followup_lock(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
) -> Result<Option<Conversation>, HostdeskError> {
    let tenant_id = tenant_id.to_string();
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations \
                 SET ia_locked = 0, ia_locked_at = NULL, ia_locked_by = NULL, updated_at = ?1 \
                 WHERE id = ?2 AND tenant_id = ?3 AND ia_locked = 1 AND ia_locked_by = ?4 \
                 AND status NOT IN ('CLOSED', 'ARCHIVED')",
                params![ts(&now()), conversation_id, tenant_id, LOCKED_BY_FOLLOWUP],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select(conn, &tenant_id, &conversation_id)
        })
        .await
        .map_err(map_tr_err)
}
