//! Weekly grace tokens that cover a single missed streak day.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::week_start;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraceError {
    #[error("a grace token was already granted for the week starting {week}")]
    AlreadyGranted { week: NaiveDate },
    #[error("no unused grace token available to protect `{key}` on {date}")]
    NoneAvailable { key: String, date: NaiveDate },
    #[error("grace token {id} does not exist")]
    UnknownToken { id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceToken {
    pub id: u32,
    pub awarded_on: NaiveDate,
    #[serde(default)]
    pub used_on: Option<NaiveDate>,
    #[serde(default)]
    pub streak_key: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GraceToken {
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used_on.is_some()
    }
}

/// Every token ever granted, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct GraceLedger {
    tokens: Vec<GraceToken>,
}

impl GraceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GraceToken> {
        self.tokens.iter()
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&GraceToken> {
        self.tokens.iter().find(|token| token.id == id)
    }

    /// Unused tokens usable on `date`.
    pub fn available(&self, date: NaiveDate) -> impl Iterator<Item = &GraceToken> {
        self.tokens
            .iter()
            .filter(move |token| !token.is_used() && token.awarded_on <= date)
    }

    #[must_use]
    pub fn available_count(&self, date: NaiveDate) -> usize {
        self.available(date).count()
    }

    /// Grant the token for the week containing `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GraceError::AlreadyGranted`] when that week already has one.
    pub fn grant(&mut self, date: NaiveDate) -> Result<GraceToken, GraceError> {
        let week = week_start(date);
        if self
            .tokens
            .iter()
            .any(|token| week_start(token.awarded_on) == week)
        {
            return Err(GraceError::AlreadyGranted { week });
        }
        let id = self.tokens.iter().map(|token| token.id).max().unwrap_or(0) + 1;
        let token = GraceToken {
            id,
            awarded_on: date,
            used_on: None,
            streak_key: None,
            reason: None,
        };
        self.tokens.push(token.clone());
        Ok(token)
    }

    /// Mark the oldest usable token as spent on `key`.
    ///
    /// Returns the token as it is after consumption.
    ///
    /// # Errors
    ///
    /// Returns [`GraceError::NoneAvailable`] when every token is spent.
    pub fn consume(
        &mut self,
        date: NaiveDate,
        key: &str,
        reason: Option<&str>,
    ) -> Result<GraceToken, GraceError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|token| !token.is_used() && token.awarded_on <= date)
            .ok_or_else(|| GraceError::NoneAvailable {
                key: key.to_string(),
                date,
            })?;
        token.used_on = Some(date);
        token.streak_key = Some(key.to_string());
        token.reason = reason.map(str::to_string);
        Ok(token.clone())
    }

    /// Return a consumed token to the unused pool.
    ///
    /// # Errors
    ///
    /// Returns [`GraceError::UnknownToken`] for ids never granted.
    pub fn release(&mut self, id: u32) -> Result<(), GraceError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|token| token.id == id)
            .ok_or(GraceError::UnknownToken { id })?;
        token.used_on = None;
        token.streak_key = None;
        token.reason = None;
        Ok(())
    }

    /// Insert or replace a token by id.
    pub fn upsert(&mut self, token: GraceToken) {
        match self.tokens.iter_mut().find(|existing| existing.id == token.id) {
            Some(existing) => *existing = token,
            None => {
                self.tokens.push(token);
                self.tokens.sort_by_key(|token| token.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn one_grant_per_monday_week() {
        let mut ledger = GraceLedger::new();
        // 2026-10-19 is a Monday, 2026-10-25 the following Sunday.
        ledger.grant(date(19)).unwrap();
        assert_eq!(
            ledger.grant(date(25)),
            Err(GraceError::AlreadyGranted { week: date(19) })
        );
        let next = ledger.grant(date(26)).unwrap();
        assert_eq!(next.id, 2);
        assert_eq!(ledger.available_count(date(26)), 2);
    }

    #[test]
    fn consume_spends_oldest_token() {
        let mut ledger = GraceLedger::new();
        ledger.grant(date(12)).unwrap();
        ledger.grant(date(19)).unwrap();
        let used = ledger
            .consume(date(20), "squash_daily", Some("travel"))
            .unwrap();
        assert_eq!(used.id, 1);
        assert_eq!(used.used_on, Some(date(20)));
        assert_eq!(used.streak_key.as_deref(), Some("squash_daily"));
        assert_eq!(ledger.available_count(date(20)), 1);
    }

    #[test]
    fn consume_without_tokens_fails() {
        let mut ledger = GraceLedger::new();
        assert!(matches!(
            ledger.consume(date(20), "flex_daily", None),
            Err(GraceError::NoneAvailable { .. })
        ));
        ledger.grant(date(22)).unwrap();
        assert!(ledger.consume(date(20), "flex_daily", None).is_err());
    }

    #[test]
    fn release_restores_token() {
        let mut ledger = GraceLedger::new();
        ledger.grant(date(19)).unwrap();
        let used = ledger.consume(date(21), "study_daily", None).unwrap();
        ledger.release(used.id).unwrap();
        assert_eq!(ledger.available_count(date(21)), 1);
        assert_eq!(ledger.release(9), Err(GraceError::UnknownToken { id: 9 }));
    }
}
