// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Every function takes the tenant id it filters by,
//! except the job table, which is not tenant-scoped.

pub mod contacts;
pub mod conversations;
pub mod escalations;
pub mod jobs;
pub mod messages;
