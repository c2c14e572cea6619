use shared::{
    domain::{AccessLevel, NewProfile, UserType, VerificationStatus},
    error::ApiError,
    forms::{BusinessPartnerRegistrationForm, CareFacilityRegistrationForm},
    protocol::{BusinessPartnerRegistrationResponse, CareFacilityRegistrationResponse},
};
use tracing::info;

use crate::{internal, ApiContext};

/// Signs a company up and files its registration for review. The new
/// profile stays read-only while verification is pending. Writes after
/// sign-up are not rolled back on failure.
pub async fn register_business_partner(
    ctx: &ApiContext,
    form: &BusinessPartnerRegistrationForm,
) -> Result<BusinessPartnerRegistrationResponse, ApiError> {
    form.validate()?;

    let user_id = ctx.identity.sign_up(form.email.trim(), &form.password).await?;
    let profile = ctx
        .storage
        .insert_profile(&NewProfile {
            id: user_id,
            full_name: form.company_name.trim().to_string(),
            email: form.email.trim().to_string(),
            location: form.address.trim().to_string(),
            bio: form.business_profile.trim().to_string(),
            user_type: UserType::BusinessPartner,
            skills: Vec::new(),
            interests: Vec::new(),
            verification_status: VerificationStatus::InVerification,
            access_level: AccessLevel::ReadOnly,
        })
        .await
        .map_err(internal)?;
    let registration = ctx
        .storage
        .insert_business_partner_registration(user_id, form)
        .await
        .map_err(internal)?;

    info!(%user_id, registration_id = %registration.id, "business partner registered");
    Ok(BusinessPartnerRegistrationResponse {
        profile,
        registration,
    })
}

pub async fn register_care_facility(
    ctx: &ApiContext,
    form: &CareFacilityRegistrationForm,
) -> Result<CareFacilityRegistrationResponse, ApiError> {
    let organisation_type = form.validate()?;

    let user_id = ctx.identity.sign_up(form.email.trim(), &form.password).await?;
    let profile = ctx
        .storage
        .insert_profile(&NewProfile {
            id: user_id,
            full_name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            location: form.address.trim().to_string(),
            bio: form.business_profile.trim().to_string(),
            user_type: UserType::CareFacilityNgo,
            skills: Vec::new(),
            interests: Vec::new(),
            verification_status: VerificationStatus::InVerification,
            access_level: AccessLevel::ReadOnly,
        })
        .await
        .map_err(internal)?;
    let registration = ctx
        .storage
        .insert_care_facility_registration(user_id, organisation_type, form)
        .await
        .map_err(internal)?;

    let mut documents = Vec::with_capacity(form.documents.len());
    for upload in &form.documents {
        let document = ctx
            .storage
            .insert_care_facility_document(registration.id, upload)
            .await
            .map_err(internal)?;
        documents.push(document);
    }

    info!(
        %user_id,
        registration_id = %registration.id,
        %organisation_type,
        documents = documents.len(),
        "care facility registered"
    );
    Ok(CareFacilityRegistrationResponse {
        profile,
        registration,
        documents,
        required_documents: organisation_type.required_documents().to_string(),
    })
}
