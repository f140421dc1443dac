use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::vacation::{Vacation, VacationId};
use crate::errors::StoreError;

/// Vacation records. Both queries order by start date.
#[async_trait]
pub trait VacationStore: Send + Sync {
    async fn create(
        &self,
        user: &str,
        description: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vacation, StoreError>;

    /// Vacations that have not ended before `today`.
    async fn upcoming(&self, today: NaiveDate) -> Result<Vec<Vacation>, StoreError>;

    /// Vacations whose inclusive window contains `today`.
    async fn current(&self, today: NaiveDate) -> Result<Vec<Vacation>, StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryVacationStore {
    vacations: Arc<Mutex<Vec<Vacation>>>,
}

impl InMemoryVacationStore {
    fn filtered(&self, keep: impl Fn(&Vacation) -> bool) -> Vec<Vacation> {
        let mut matching: Vec<Vacation> = match self.vacations.lock() {
            Ok(vacations) => vacations.iter().filter(|vacation| keep(vacation)).cloned().collect(),
            Err(poisoned) => {
                poisoned.into_inner().iter().filter(|vacation| keep(vacation)).cloned().collect()
            }
        };
        matching.sort_by_key(|vacation| (vacation.start_date, vacation.id.0));
        matching
    }
}

#[async_trait]
impl VacationStore for InMemoryVacationStore {
    async fn create(
        &self,
        user: &str,
        description: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vacation, StoreError> {
        let mut vacations = match self.vacations.lock() {
            Ok(vacations) => vacations,
            Err(poisoned) => poisoned.into_inner(),
        };
        let vacation = Vacation {
            id: VacationId(vacations.len() as i64 + 1),
            user: user.to_owned(),
            description: description.to_owned(),
            start_date,
            end_date,
        };
        vacations.push(vacation.clone());
        Ok(vacation)
    }

    async fn upcoming(&self, today: NaiveDate) -> Result<Vec<Vacation>, StoreError> {
        Ok(self.filtered(|vacation| vacation.is_upcoming_or_current(today)))
    }

    async fn current(&self, today: NaiveDate) -> Result<Vec<Vacation>, StoreError> {
        Ok(self.filtered(|vacation| vacation.is_current(today)))
    }
}
