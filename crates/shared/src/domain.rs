use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(RelationId);
id_newtype!(ActivityId);
id_newtype!(AssignmentId);
id_newtype!(OpportunityId);
id_newtype!(EventId);
id_newtype!(FavoriteId);
id_newtype!(IdeaId);
id_newtype!(RegistrationId);
id_newtype!(DocumentId);

/// Profile ids double as identity-account ids, so they are UUIDs rather
/// than row counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(pub Uuid);

impl ProfileId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum whose serde form and stored column value are
/// the same snake_case string.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

str_enum!(UserType {
    Volunteer => "volunteer",
    BusinessPartner => "business_partner",
    CareFacilityNgo => "care_facility_ngo",
});

str_enum!(VerificationStatus {
    NotVerified => "not_verified",
    InVerification => "in_verification",
    Verified => "verified",
    Rejected => "rejected",
});

impl VerificationStatus {
    pub fn label(self) -> &'static str {
        match self {
            VerificationStatus::NotVerified => "Not Verified",
            VerificationStatus::InVerification => "In Verification",
            VerificationStatus::Verified => "Verified",
            VerificationStatus::Rejected => "Rejected",
        }
    }
}

str_enum!(AccessLevel {
    ReadOnly => "read_only",
    FullAccess => "full_access",
});

str_enum!(
    /// Stored status of a volunteer/partner relation. Rejected and cancelled
    /// requests are deleted, so they have no status of their own.
    RelationStatus {
        Pending => "pending",
        Invited => "invited",
        Active => "active",
        Released => "released",
    }
);

str_enum!(InvitationType {
    PartnerInvite => "partner_invite",
    VolunteerRequest => "volunteer_request",
});

str_enum!(FavoriteItemType {
    UrgentNeed => "urgent_need",
    Event => "event",
});

str_enum!(AssignmentStatus {
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
});

str_enum!(OrganisationType {
    NgoOrganisation => "ngo_organisation",
    CareFacility => "care_facility",
    Teacher => "teacher",
    School => "school",
    Other => "other",
});

impl OrganisationType {
    pub fn requires_krs(self) -> bool {
        matches!(
            self,
            OrganisationType::NgoOrganisation | OrganisationType::CareFacility
        )
    }

    pub fn required_documents(self) -> &'static str {
        match self {
            OrganisationType::NgoOrganisation | OrganisationType::CareFacility => {
                "KRS certificate, establishment decision, operating license"
            }
            OrganisationType::Teacher => "Agreement with school, teaching certificate",
            OrganisationType::School => "School registration, operating license",
            OrganisationType::Other => "Relevant registration documents",
        }
    }
}

str_enum!(RegistrationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(IdeaStatus {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
});

str_enum!(ApplicationStatus {
    InApplication => "in_application",
    InProgress => "in_progress",
    Completed => "completed",
});

str_enum!(OrganisationVolunteerStatus {
    Active => "active",
    Inactive => "inactive",
});

str_enum!(OrganisationActivityType {
    VolunteerOnboarded => "volunteer_onboarded",
    ApplicationReceived => "application_received",
    EventCreated => "event_created",
    Other => "other",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub full_name: String,
    pub email: String,
    pub location: String,
    #[serde(default)]
    pub bio: String,
    pub user_type: UserType,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub points: u64,
    pub verification_status: VerificationStatus,
    pub access_level: AccessLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Read-only profiles can browse, favorite and submit ideas, nothing else.
    pub fn is_read_only(&self) -> bool {
        self.access_level == AccessLevel::ReadOnly
            || self.verification_status == VerificationStatus::InVerification
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: ProfileId,
    pub full_name: String,
    pub email: String,
    pub location: String,
    pub bio: String,
    pub user_type: UserType,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub verification_status: VerificationStatus,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub volunteer_id: ProfileId,
    pub business_partner_id: ProfileId,
    pub status: RelationStatus,
    pub invitation_type: InvitationType,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    pub fn involves(&self, profile_id: ProfileId) -> bool {
        self.volunteer_id == profile_id || self.business_partner_id == profile_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRelation {
    pub volunteer_id: ProfileId,
    pub business_partner_id: ProfileId,
    pub status: RelationStatus,
    pub invitation_type: InvitationType,
    pub joined_at: Option<DateTime<Utc>>,
}

/// A relation together with the profile on the other side of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationWithProfile {
    pub relation: Relation,
    pub counterpart: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub user_id: ProfileId,
    pub activity_type: String,
    pub description: String,
    pub points_earned: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedOpportunity {
    pub id: AssignmentId,
    pub user_id: ProfileId,
    pub opportunity_title: String,
    pub status: AssignmentStatus,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub user_id: ProfileId,
    pub item_type: FavoriteItemType,
    pub item_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaSubmission {
    pub id: IdeaId,
    pub user_id: ProfileId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub status: IdeaStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessPartnerRegistration {
    pub id: RegistrationId,
    pub user_id: ProfileId,
    pub company_name: String,
    pub date_of_establishment: NaiveDate,
    pub business_profile: String,
    pub address: String,
    pub nip: String,
    pub contact_person: String,
    pub phone: String,
    pub email: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareFacilityRegistration {
    pub id: RegistrationId,
    pub user_id: ProfileId,
    pub organisation_type: OrganisationType,
    pub name: String,
    pub date_of_establishment: NaiveDate,
    pub business_profile: String,
    pub detailed_description: String,
    pub address: String,
    #[serde(default)]
    pub secondary_address: Option<String>,
    #[serde(default)]
    pub krs: Option<String>,
    pub email: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareFacilityDocument {
    pub id: DocumentId,
    pub registration_id: RegistrationId,
    pub document_type: String,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganisationActivity {
    pub id: i64,
    pub organisation_id: ProfileId,
    pub activity_type: OrganisationActivityType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
