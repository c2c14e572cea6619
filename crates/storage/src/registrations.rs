use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteRow, Row};

use shared::{
    domain::{
        BusinessPartnerRegistration, CareFacilityDocument, CareFacilityRegistration, DocumentId,
        OrganisationType, ProfileId, RegistrationId,
    },
    forms::{BusinessPartnerRegistrationForm, CareFacilityRegistrationForm, DocumentUpload},
};

use crate::{non_negative, parse_column, Storage};

const DOCUMENT_COLUMNS: &str =
    "id, registration_id, document_type, file_name, file_url, file_size, created_at";

fn document_from_row(row: &SqliteRow) -> Result<CareFacilityDocument> {
    Ok(CareFacilityDocument {
        id: DocumentId(row.try_get("id")?),
        registration_id: RegistrationId(row.try_get("registration_id")?),
        document_type: row.try_get("document_type")?,
        file_name: row.try_get("file_name")?,
        file_url: row.try_get("file_url")?,
        file_size: non_negative(row.try_get("file_size")?),
        created_at: row.try_get("created_at")?,
    })
}

impl Storage {
    /// Stores the company details of a partner registration. Credentials are
    /// never part of the record.
    pub async fn insert_business_partner_registration(
        &self,
        user_id: ProfileId,
        form: &BusinessPartnerRegistrationForm,
    ) -> Result<BusinessPartnerRegistration> {
        let row = sqlx::query(
            "INSERT INTO business_partner_registrations
                (user_id, company_name, date_of_establishment, business_profile, address,
                 nip, contact_person, phone, email)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id, user_id, company_name, date_of_establishment, business_profile,
                       address, nip, contact_person, phone, email, status, created_at",
        )
        .bind(user_id.0)
        .bind(form.company_name.trim())
        .bind(form.date_of_establishment)
        .bind(form.business_profile.trim())
        .bind(form.address.trim())
        .bind(form.nip.trim())
        .bind(form.contact_person.trim())
        .bind(form.phone.trim())
        .bind(form.email.trim())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert business partner registration")?;

        Ok(BusinessPartnerRegistration {
            id: RegistrationId(row.try_get("id")?),
            user_id: ProfileId(row.try_get("user_id")?),
            company_name: row.try_get("company_name")?,
            date_of_establishment: row.try_get("date_of_establishment")?,
            business_profile: row.try_get("business_profile")?,
            address: row.try_get("address")?,
            nip: row.try_get("nip")?,
            contact_person: row.try_get("contact_person")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            status: parse_column(&row, "status")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn insert_care_facility_registration(
        &self,
        user_id: ProfileId,
        organisation_type: OrganisationType,
        form: &CareFacilityRegistrationForm,
    ) -> Result<CareFacilityRegistration> {
        let row = sqlx::query(
            "INSERT INTO care_facility_registrations
                (user_id, organisation_type, name, date_of_establishment, business_profile,
                 detailed_description, address, secondary_address, krs, email)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id, user_id, organisation_type, name, date_of_establishment,
                       business_profile, detailed_description, address, secondary_address,
                       krs, email, status, created_at",
        )
        .bind(user_id.0)
        .bind(organisation_type.as_str())
        .bind(form.name.trim())
        .bind(form.date_of_establishment)
        .bind(form.business_profile.trim())
        .bind(form.detailed_description.trim())
        .bind(form.address.trim())
        .bind(form.secondary_address())
        .bind(form.krs_number())
        .bind(form.email.trim())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert care facility registration")?;

        Ok(CareFacilityRegistration {
            id: RegistrationId(row.try_get("id")?),
            user_id: ProfileId(row.try_get("user_id")?),
            organisation_type: parse_column(&row, "organisation_type")?,
            name: row.try_get("name")?,
            date_of_establishment: row.try_get("date_of_establishment")?,
            business_profile: row.try_get("business_profile")?,
            detailed_description: row.try_get("detailed_description")?,
            address: row.try_get("address")?,
            secondary_address: row.try_get("secondary_address")?,
            krs: row.try_get("krs")?,
            email: row.try_get("email")?,
            status: parse_column(&row, "status")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Records document metadata. The file itself is held by external
    /// storage, so the URL starts out empty.
    pub async fn insert_care_facility_document(
        &self,
        registration_id: RegistrationId,
        upload: &DocumentUpload,
    ) -> Result<CareFacilityDocument> {
        let file_size = i64::try_from(upload.file_size).context("document too large")?;
        let row = sqlx::query(&format!(
            "INSERT INTO care_facility_documents
                (registration_id, document_type, file_name, file_url, file_size)
             VALUES (?, ?, ?, '', ?)
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(registration_id.0)
        .bind(upload.document_type())
        .bind(&upload.file_name)
        .bind(file_size)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to store document '{}'", upload.file_name))?;
        document_from_row(&row)
    }

    pub async fn list_care_facility_documents(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Vec<CareFacilityDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM care_facility_documents
             WHERE registration_id = ?
             ORDER BY id ASC"
        ))
        .bind(registration_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }
}
