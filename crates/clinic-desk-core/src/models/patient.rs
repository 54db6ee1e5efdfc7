//! Patient models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, RecordStatus, ValidationError};

/// A patient record as stored in `patients_records`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Server-assigned identity
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Medical record number (display, sort and search key)
    pub medical_record_number: Option<String>,
    pub home_address: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
    /// Server-side creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Patient {
    /// First and last name joined, skipping missing parts.
    pub fn full_name(&self) -> Option<String> {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// Join name parts that are present and non-blank.
pub(crate) fn join_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Insert payload for a new patient (the server assigns `id`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub medical_record_number: Option<String>,
    pub home_address: Option<String>,
    pub status: RecordStatus,
}

/// Raw input of the "Add Patient" form.
///
/// Fields hold exactly what the user typed; nothing is parsed until
/// [`PatientForm::validate`] runs on submit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientForm {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub phone_number: String,
    /// `YYYY-MM-DD`, or blank
    pub date_of_birth: String,
    pub medical_record_number: String,
    pub home_address: String,
    pub status: RecordStatus,
}

impl PatientForm {
    /// Check the form and build the insert payload.
    pub fn validate(&self, today: NaiveDate) -> Result<NewPatient, ValidationError> {
        let first_name = non_blank(&self.first_name);
        let last_name = non_blank(&self.last_name);
        if first_name.is_none() && last_name.is_none() {
            return Err(ValidationError::MissingName);
        }

        let email_address = non_blank(&self.email_address);
        if let Some(email) = &email_address {
            if !looks_like_email(email) {
                return Err(ValidationError::InvalidEmail(email.clone()));
            }
        }

        let date_of_birth = match non_blank(&self.date_of_birth) {
            Some(raw) => {
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| ValidationError::InvalidDate(raw.clone()))?;
                if date > today {
                    return Err(ValidationError::FutureDateOfBirth(raw));
                }
                Some(date)
            }
            None => None,
        };

        Ok(NewPatient {
            first_name,
            last_name,
            email_address,
            phone_number: non_blank(&self.phone_number),
            date_of_birth,
            medical_record_number: non_blank(&self.medical_record_number),
            home_address: non_blank(&self.home_address),
            status: self.status,
        })
    }

    /// True when nothing has been typed yet.
    pub fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn filled_form() -> PatientForm {
        PatientForm {
            first_name: " Ada ".into(),
            last_name: "Lovelace".into(),
            email_address: "ada@example.org".into(),
            phone_number: "".into(),
            date_of_birth: "1990-12-10".into(),
            medical_record_number: "MRN-001".into(),
            home_address: "   ".into(),
            status: RecordStatus::Pending,
        }
    }

    #[test]
    fn test_validate_trims_and_nulls_blanks() {
        let new = filled_form().validate(today()).unwrap();
        assert_eq!(new.first_name, Some("Ada".into()));
        assert_eq!(new.phone_number, None);
        assert_eq!(new.home_address, None);
        assert_eq!(
            new.date_of_birth,
            Some(NaiveDate::from_ymd_opt(1990, 12, 10).unwrap())
        );
    }

    #[test]
    fn test_validate_requires_a_name() {
        let mut form = filled_form();
        form.first_name.clear();
        form.last_name = "  ".into();
        assert_eq!(form.validate(today()), Err(ValidationError::MissingName));
    }

    #[test]
    fn test_validate_email_shape() {
        let mut form = filled_form();
        for bad in ["ada", "ada@", "@example.org", "ada@example", "a b@example.org"] {
            form.email_address = bad.into();
            assert!(
                matches!(form.validate(today()), Err(ValidationError::InvalidEmail(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_date_of_birth() {
        let mut form = filled_form();
        form.date_of_birth = "12/10/1990".into();
        assert!(matches!(
            form.validate(today()),
            Err(ValidationError::InvalidDate(_))
        ));

        form.date_of_birth = "2030-01-01".into();
        assert!(matches!(
            form.validate(today()),
            Err(ValidationError::FutureDateOfBirth(_))
        ));
    }

    #[test]
    fn test_full_name_skips_missing_parts() {
        let mut form = filled_form();
        form.first_name.clear();
        let new = form.validate(today()).unwrap();
        assert_eq!(join_name(new.first_name.as_deref(), new.last_name.as_deref()), Some("Lovelace".into()));
        assert_eq!(join_name(None, None), None);
    }

    #[test]
    fn test_blank_form() {
        assert!(PatientForm::default().is_blank());
        assert!(!filled_form().is_blank());
    }
}
