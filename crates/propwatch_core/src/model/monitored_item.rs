//! Recurring maintenance obligation with derived schedule dates.
//!
//! # Responsibility
//! - Validate recurrence inputs on construction and update.
//! - Keep `time_for_next_action` and `time_for_next_notice` in sync with
//!   their inputs.
//!
//! # Invariants
//! - `time_for_next_action = last_action_performed + notice_every x period_for_next_action`.
//! - `time_for_next_notice = time_for_next_action - advance_notice x period_for_next_notice`.
//! - The notice date may fall before `last_action_performed`; this is allowed.
//! - Equality and hashing use `description` only.

use crate::model::address::Address;
use crate::model::period::{advance, retreat, Period};
use crate::model::validation::{
    require_description, require_interval, EntityKind, ModelValidationError,
};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Recurring obligation attached to a property.
#[derive(Debug, Clone)]
pub struct MonitoredItem {
    description: String,
    last_action_performed: NaiveDate,
    period_for_next_action: Period,
    notice_every: u32,
    period_for_next_notice: Period,
    advance_notice: u32,
    time_for_next_action: NaiveDate,
    time_for_next_notice: NaiveDate,
    email_sent_on: Option<NaiveDate>,
    owner: Option<Address>,
}

impl MonitoredItem {
    /// Creates a validated item with derived schedule dates.
    ///
    /// # Errors
    /// - `BlankDescription` when `description` is blank.
    /// - `ZeroInterval` when `notice_every` or `advance_notice` is zero.
    pub fn new(
        description: impl Into<String>,
        period_for_next_action: Period,
        notice_every: u32,
        last_action_performed: NaiveDate,
        advance_notice: u32,
        period_for_next_notice: Period,
    ) -> Result<Self, ModelValidationError> {
        let description = require_description(EntityKind::MonitoredItem, description)?;
        let notice_every = require_interval("notice_every", notice_every)?;
        let advance_notice = require_interval("advance_notice", advance_notice)?;

        let mut item = Self {
            description,
            last_action_performed,
            period_for_next_action,
            notice_every,
            period_for_next_notice,
            advance_notice,
            time_for_next_action: last_action_performed,
            time_for_next_notice: last_action_performed,
            email_sent_on: None,
            owner: None,
        };
        item.recalculate_times();
        Ok(item)
    }

    /// Builder-style owner attachment.
    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Builder-style email marker, used when reconstructing stored items.
    pub fn with_email_sent_on(mut self, when: Option<NaiveDate>) -> Self {
        self.email_sent_on = when;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn owner(&self) -> Option<&Address> {
        self.owner.as_ref()
    }

    pub fn set_owner(&mut self, owner: Address) {
        self.owner = Some(owner);
    }

    pub fn clear_owner(&mut self) {
        self.owner = None;
    }

    pub fn last_action_performed(&self) -> NaiveDate {
        self.last_action_performed
    }

    pub fn period_for_next_action(&self) -> Period {
        self.period_for_next_action
    }

    pub fn notice_every(&self) -> u32 {
        self.notice_every
    }

    pub fn period_for_next_notice(&self) -> Period {
        self.period_for_next_notice
    }

    pub fn advance_notice(&self) -> u32 {
        self.advance_notice
    }

    pub fn time_for_next_action(&self) -> NaiveDate {
        self.time_for_next_action
    }

    pub fn time_for_next_notice(&self) -> NaiveDate {
        self.time_for_next_notice
    }

    pub fn email_sent_on(&self) -> Option<NaiveDate> {
        self.email_sent_on
    }

    /// Records that the obligation was satisfied on `when`.
    pub fn action_performed(&mut self, when: NaiveDate) {
        self.last_action_performed = when;
        self.recalculate_times();
    }

    pub fn set_period_for_next_action(&mut self, period: Period) {
        self.period_for_next_action = period;
        self.recalculate_times();
    }

    pub fn set_notice_every(&mut self, notice_every: u32) -> Result<(), ModelValidationError> {
        self.notice_every = require_interval("notice_every", notice_every)?;
        self.recalculate_times();
        Ok(())
    }

    pub fn set_advance_notice(&mut self, advance_notice: u32) -> Result<(), ModelValidationError> {
        self.advance_notice = require_interval("advance_notice", advance_notice)?;
        self.recalculate_next_notice();
        Ok(())
    }

    pub fn set_period_for_next_notice(&mut self, period: Period) {
        self.period_for_next_notice = period;
        self.recalculate_next_notice();
    }

    pub fn set_email_sent_on(&mut self, when: Option<NaiveDate>) {
        self.email_sent_on = when;
    }

    /// True when `as_of` is strictly after the next action date.
    pub fn overdue(&self, as_of: NaiveDate) -> bool {
        as_of > self.time_for_next_action
    }

    /// True when `as_of` is strictly after the next notice date.
    pub fn notice_due(&self, as_of: NaiveDate) -> bool {
        as_of > self.time_for_next_notice
    }

    /// Schedule order: earliest next action first.
    pub fn schedule_order(a: &Self, b: &Self) -> Ordering {
        a.time_for_next_action.cmp(&b.time_for_next_action)
    }

    fn recalculate_times(&mut self) {
        self.time_for_next_action = advance(
            self.last_action_performed,
            self.notice_every,
            self.period_for_next_action,
        );
        self.recalculate_next_notice();
    }

    fn recalculate_next_notice(&mut self) {
        self.time_for_next_notice = retreat(
            self.time_for_next_action,
            self.advance_notice,
            self.period_for_next_notice,
        );
    }
}

impl PartialEq for MonitoredItem {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
    }
}

impl Eq for MonitoredItem {}

impl Hash for MonitoredItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.description.hash(state);
    }
}

impl Display for MonitoredItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}
