//! Submission forms and the checks they must pass before anything is
//! persisted or sent over the network.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{FavoriteItemType, OrganisationType, ProfileId};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_IDEA_TITLE_CHARS: usize = 200;
pub const MAX_IDEA_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Please upload at least one document")]
    MissingDocuments,
    #[error("Please select an organisation type")]
    MissingOrganisationType,
    #[error("KRS number is required for NGO and Care Facility organisations")]
    MissingKrs,
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

fn require(value: &str, field: &'static str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::MissingField(field));
    }
    Ok(())
}

fn check_passwords(password: &str, confirm_password: &str) -> Result<(), FormError> {
    if password != confirm_password {
        return Err(FormError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FormError::PasswordTooShort);
    }
    Ok(())
}

/// Splits comma-separated free text into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Metadata of an uploaded supporting document. The bytes themselves live in
/// external file storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub file_name: String,
    pub file_size: u64,
}

impl DocumentUpload {
    pub fn document_type(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessPartnerRegistrationForm {
    pub company_name: String,
    pub date_of_establishment: NaiveDate,
    pub business_profile: String,
    pub address: String,
    pub nip: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

impl BusinessPartnerRegistrationForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.company_name, "Company name")?;
        require(&self.business_profile, "Business profile")?;
        require(&self.address, "Address")?;
        require(&self.nip, "NIP")?;
        require(&self.contact_person, "Contact person")?;
        require(&self.phone, "Phone number")?;
        require(&self.email, "Email")?;
        check_passwords(&self.password, &self.confirm_password)?;
        if self.documents.is_empty() {
            return Err(FormError::MissingDocuments);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareFacilityRegistrationForm {
    #[serde(default)]
    pub organisation_type: Option<OrganisationType>,
    pub name: String,
    pub date_of_establishment: NaiveDate,
    pub business_profile: String,
    #[serde(default)]
    pub detailed_description: String,
    pub address: String,
    #[serde(default)]
    pub secondary_address: Option<String>,
    #[serde(default)]
    pub krs: Option<String>,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

impl CareFacilityRegistrationForm {
    /// Returns the chosen organisation type once every check has passed.
    pub fn validate(&self) -> Result<OrganisationType, FormError> {
        let organisation_type = self
            .organisation_type
            .ok_or(FormError::MissingOrganisationType)?;
        require(&self.name, "Name")?;
        require(&self.business_profile, "Business profile")?;
        require(&self.address, "Address")?;
        require(&self.email, "Email")?;
        check_passwords(&self.password, &self.confirm_password)?;
        if organisation_type.requires_krs() && self.krs_number().is_none() {
            return Err(FormError::MissingKrs);
        }
        if self.documents.is_empty() {
            return Err(FormError::MissingDocuments);
        }
        Ok(organisation_type)
    }

    pub fn krs_number(&self) -> Option<&str> {
        self.krs
            .as_deref()
            .map(str::trim)
            .filter(|krs| !krs.is_empty())
    }

    pub fn secondary_address(&self) -> Option<&str> {
        self.secondary_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }
}

/// A partner registering a volunteer who has no account of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolunteerRegistrationForm {
    pub full_name: String,
    pub email: String,
    pub location: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub interests: String,
    #[serde(default)]
    pub bio: String,
}

impl VolunteerRegistrationForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.full_name, "Full name")?;
        require(&self.email, "Email")?;
        require(&self.location, "Location")?;
        Ok(())
    }

    pub fn skill_list(&self) -> Vec<String> {
        split_list(&self.skills)
    }

    pub fn interest_list(&self) -> Vec<String> {
        split_list(&self.interests)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaForm {
    pub user_id: ProfileId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl IdeaForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.title, "Idea title")?;
        if self.title.chars().count() > MAX_IDEA_TITLE_CHARS {
            return Err(FormError::TooLong {
                field: "Idea title",
                max: MAX_IDEA_TITLE_CHARS,
            });
        }
        require(&self.description, "Description")?;
        if self.description.chars().count() > MAX_IDEA_DESCRIPTION_CHARS {
            return Err(FormError::TooLong {
                field: "Description",
                max: MAX_IDEA_DESCRIPTION_CHARS,
            });
        }
        Ok(())
    }

    /// Empty categories are stored as "no category".
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteTarget {
    pub user_id: ProfileId,
    pub item_type: FavoriteItemType,
    pub item_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner_form() -> BusinessPartnerRegistrationForm {
        BusinessPartnerRegistrationForm {
            company_name: "Acme".into(),
            date_of_establishment: NaiveDate::from_ymd_opt(2010, 5, 1).expect("date"),
            business_profile: "We help".into(),
            address: "Main St 1, Warsaw".into(),
            nip: "1234567890".into(),
            contact_person: "Jo".into(),
            email: "acme@example.org".into(),
            phone: "+48 123".into(),
            password: "correct horse".into(),
            confirm_password: "correct horse".into(),
            documents: vec![DocumentUpload {
                file_name: "krs.pdf".into(),
                file_size: 1024,
            }],
        }
    }

    fn facility_form(organisation_type: Option<OrganisationType>) -> CareFacilityRegistrationForm {
        CareFacilityRegistrationForm {
            organisation_type,
            name: "Sunny Home".into(),
            date_of_establishment: NaiveDate::from_ymd_opt(1999, 1, 1).expect("date"),
            business_profile: "Elder care".into(),
            detailed_description: String::new(),
            address: "Oak St 2".into(),
            secondary_address: Some("   ".into()),
            krs: None,
            email: "home@example.org".into(),
            password: "longenough".into(),
            confirm_password: "longenough".into(),
            documents: vec![DocumentUpload {
                file_name: "license".into(),
                file_size: 10,
            }],
        }
    }

    #[test]
    fn password_mismatch_is_reported_before_length() {
        let mut form = partner_form();
        form.password = "short".into();
        form.confirm_password = "other".into();
        assert_eq!(form.validate(), Err(FormError::PasswordMismatch));
        assert_eq!(
            FormError::PasswordMismatch.to_string(),
            "Passwords do not match"
        );
    }

    #[test]
    fn short_password_is_rejected() {
        let mut form = partner_form();
        form.password = "1234567".into();
        form.confirm_password = "1234567".into();
        assert_eq!(form.validate(), Err(FormError::PasswordTooShort));
    }

    #[test]
    fn partner_registration_needs_a_document() {
        let mut form = partner_form();
        assert_eq!(form.validate(), Ok(()));
        form.documents.clear();
        assert_eq!(form.validate(), Err(FormError::MissingDocuments));
    }

    #[test]
    fn krs_is_required_only_for_ngo_and_care_facility() {
        assert_eq!(
            facility_form(None).validate(),
            Err(FormError::MissingOrganisationType)
        );
        assert_eq!(
            facility_form(Some(OrganisationType::CareFacility)).validate(),
            Err(FormError::MissingKrs)
        );
        assert_eq!(
            facility_form(Some(OrganisationType::School)).validate(),
            Ok(OrganisationType::School)
        );

        let mut with_krs = facility_form(Some(OrganisationType::NgoOrganisation));
        with_krs.krs = Some("0000123456".into());
        assert_eq!(with_krs.validate(), Ok(OrganisationType::NgoOrganisation));
        assert_eq!(with_krs.secondary_address(), None);
    }

    #[test]
    fn volunteer_registration_requires_identity_fields() {
        let form = VolunteerRegistrationForm {
            full_name: "Ann".into(),
            email: "ann@example.org".into(),
            location: "  ".into(),
            skills: "Teaching, , IT Support ,".into(),
            ..Default::default()
        };
        assert_eq!(form.validate(), Err(FormError::MissingField("Location")));
        assert_eq!(form.skill_list(), vec!["Teaching", "IT Support"]);
        assert!(form.interest_list().is_empty());
    }

    #[test]
    fn idea_limits_count_characters() {
        let mut idea = IdeaForm {
            user_id: ProfileId::new_random(),
            title: "ż".repeat(MAX_IDEA_TITLE_CHARS),
            description: "Plant trees".into(),
            category: Some(" ".into()),
        };
        assert_eq!(idea.validate(), Ok(()));
        assert_eq!(idea.category(), None);

        idea.title.push('x');
        assert_eq!(
            idea.validate(),
            Err(FormError::TooLong {
                field: "Idea title",
                max: MAX_IDEA_TITLE_CHARS
            })
        );
    }

    #[test]
    fn document_type_falls_back_without_extension() {
        let pdf = DocumentUpload {
            file_name: "statute.final.pdf".into(),
            file_size: 1,
        };
        let bare = DocumentUpload {
            file_name: "license".into(),
            file_size: 1,
        };
        assert_eq!(pdf.document_type(), "pdf");
        assert_eq!(bare.document_type(), "document");
    }
}
