//! LifeLink application flows over a [`LocalClient`].
//!
//! Registration with a role, role resolution, pending sign-up
//! reconciliation, donor search, blood requests, notifications and the admin
//! dashboard figures. Everything here goes through the public table and
//! auth surface of the client; it owns the role bridge keys
//! (`*_roles_by_email`, `*_pending_profiles`) itself.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthResponse, SignUpRequest, UserRecord};
use crate::client::LocalClient;
use crate::error::{Result, StoreError};
use crate::geo::{rank_by_distance, Coordinates};
use crate::local_db_model::{Row, TableName};
use crate::query::SelectOptions;
use crate::records::{
    now_rfc3339, BloodRequest, BloodType, DonorProfile, Notification, PendingProfile, Record,
    RequestStatus, Role, SeekerProfile, UrgencyLevel, UserRole,
};
use crate::storage::{read_json, write_json, KeyValueStore};

/// How many requests the donor dashboard shows.
pub const RECENT_REQUEST_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignInOutcome {
    pub user: UserRecord,
    pub role: Option<Role>,
    /// The role came from a pending email-keyed sign-up during this call.
    pub reconciled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDonor {
    pub donor: DonorProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_donors: usize,
    pub available_donors: usize,
    pub total_requests: usize,
    pub pending_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorSearch {
    pub blood_type: BloodType,
    #[serde(default)]
    pub origin: Option<Coordinates>,
}

pub struct LifeLink<'a, S: KeyValueStore> {
    client: &'a LocalClient<S>,
}

impl<'a, S: KeyValueStore> LifeLink<'a, S> {
    pub fn new(client: &'a LocalClient<S>) -> Self {
        Self { client }
    }

    /// Signs up, records the role, and creates the initial donor or seeker
    /// profile. A failed profile insert is logged and does not fail the
    /// registration.
    pub fn register(&self, request: SignUpRequest) -> Result<AuthResponse> {
        let role = request.role;
        let response = self.client.auth().sign_up(request)?;

        if let Some(role) = role {
            self.assign_role(&response.user.id, role)?;
            if let Err(e) = self.create_initial_profile(&response.user, role) {
                warn!("Could not create {role} profile for {}: {e}", response.user.id);
            }
        }

        Ok(response)
    }

    /// Holds a role and profile details for `email` until that user signs in.
    pub fn remember_pending_signup(&self, email: &str, role: Role, full_name: &str) -> Result<()> {
        let store = self.client.store();
        let keys = self.client.keys();

        let mut roles: BTreeMap<String, Role> =
            read_json(store, &keys.roles_by_email()).unwrap_or_default();
        roles.insert(email.to_string(), role);
        write_json(store, &keys.roles_by_email(), &roles)?;

        let mut pending: BTreeMap<String, PendingProfile> =
            read_json(store, &keys.pending_profiles()).unwrap_or_default();
        pending.insert(
            email.to_string(),
            PendingProfile {
                full_name: full_name.to_string(),
                email: email.to_string(),
            },
        );
        write_json(store, &keys.pending_profiles(), &pending)?;

        debug!("Pending {role} sign-up remembered for {email}");
        Ok(())
    }

    /// Signs in and resolves the user's role, reconciling a pending
    /// email-keyed sign-up if the user has no role yet.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        let response = self.client.auth().sign_in_with_password(email, password)?;
        let user = response.user;

        if let Some(role) = self.resolve_role(&user.id) {
            return Ok(SignInOutcome {
                user,
                role: Some(role),
                reconciled: false,
            });
        }

        let role = self.reconcile_pending(&user)?;
        Ok(SignInOutcome {
            reconciled: role.is_some(),
            user,
            role,
        })
    }

    /// The `user_roles` table first, then the legacy user id -> role map.
    pub fn resolve_role(&self, user_id: &str) -> Option<Role> {
        let from_table = self
            .client
            .from(TableName::UserRoles)
            .select("role")
            .eq("user_id", user_id)
            .single()
            .ok()
            .flatten()
            .and_then(|row| UserRole::from_row(&row).ok())
            .map(|user_role| user_role.role);

        from_table.or_else(|| {
            let legacy: BTreeMap<String, Role> =
                read_json(self.client.store(), &self.client.keys().roles()).unwrap_or_default();
            legacy.get(user_id).copied()
        })
    }

    /// One `user_roles` row per user: an existing row has its role replaced.
    pub fn assign_role(&self, user_id: &str, role: Role) -> Result<()> {
        let row = UserRole {
            user_id: user_id.to_string(),
            role,
        }
        .to_row()?;
        let updated = self
            .client
            .from(TableName::UserRoles)
            .eq("user_id", user_id)
            .update(row.clone())
            .execute()?;
        if updated.data.is_empty() {
            self.client.from(TableName::UserRoles).insert(row).execute()?;
        }
        info!("Assigned role {role} to {user_id}");
        Ok(())
    }

    /// Available donors of `blood_type`, nearest first when `origin` is known.
    /// Rows that do not parse as donor profiles are skipped.
    pub fn search_donors(&self, search: &DonorSearch) -> Result<Vec<RankedDonor>> {
        let rows = self
            .client
            .from(TableName::DonorProfiles)
            .select("*")
            .eq("blood_type", search.blood_type.as_str())
            .eq("is_available", true)
            .execute()?
            .data;

        let donors: Vec<DonorProfile> = rows.iter().filter_map(parse_logged).collect();

        let ranked = match search.origin {
            Some(origin) => rank_by_distance(donors, origin, DonorProfile::location)
                .into_iter()
                .map(|(donor, distance_km)| RankedDonor { donor, distance_km })
                .collect(),
            None => donors
                .into_iter()
                .map(|donor| RankedDonor {
                    donor,
                    distance_km: None,
                })
                .collect(),
        };

        Ok(ranked)
    }

    /// Sends a pending, high-urgency request from the signed-in user to a
    /// donor and notifies the donor.
    pub fn send_blood_request(
        &self,
        donor_id: &str,
        blood_type: BloodType,
        message: &str,
    ) -> Result<BloodRequest> {
        let seeker = self.client.auth().get_user().ok_or(StoreError::NotAuthenticated)?;

        let request = BloodRequest {
            id: None,
            seeker_id: seeker.id,
            donor_id: donor_id.to_string(),
            blood_type,
            message: message.to_string(),
            urgency_level: UrgencyLevel::High,
            status: RequestStatus::Pending,
            created_at: Some(now_rfc3339()),
        };
        let inserted = self
            .client
            .from(TableName::BloodRequests)
            .insert(request.to_row()?)
            .execute()?;
        let stored = first_record::<BloodRequest>(inserted.data)?;

        let notification = Notification {
            id: None,
            user_id: donor_id.to_string(),
            title: "New Blood Request".to_string(),
            message: format!("You have a new blood donation request for {blood_type}."),
            kind: "blood_request".to_string(),
            read: false,
            created_at: Some(now_rfc3339()),
        };
        self.client
            .from(TableName::Notifications)
            .insert(notification.to_row()?)
            .execute()?;

        info!("Blood request sent to donor {donor_id}");
        Ok(stored)
    }

    pub fn donor_profile(&self, user_id: &str) -> Result<Option<DonorProfile>> {
        self.client
            .from(TableName::DonorProfiles)
            .select("*")
            .eq("user_id", user_id)
            .single()?
            .map(|row| DonorProfile::from_row(&row))
            .transpose()
    }

    /// The donor's most recent requests, newest first.
    pub fn recent_requests_for_donor(&self, user_id: &str) -> Result<Vec<BloodRequest>> {
        let rows = self
            .client
            .from(TableName::BloodRequests)
            .select("*")
            .eq("donor_id", user_id)
            .limit(RECENT_REQUEST_LIMIT)
            .execute()?
            .data;
        Ok(rows.iter().filter_map(parse_logged).collect())
    }

    /// Returns the updated profile, or `None` if no profile has that id.
    pub fn set_donor_availability(&self, profile_id: &str, available: bool) -> Result<Option<DonorProfile>> {
        let updated = self
            .client
            .from(TableName::DonorProfiles)
            .update(Row::new().with("is_available", available))
            .eq("id", profile_id)
            .execute()?;
        updated.data.first().map(DonorProfile::from_row).transpose()
    }

    pub fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<Option<BloodRequest>> {
        let updated = self
            .client
            .from(TableName::BloodRequests)
            .update(Row::new().with("status", status.as_str()))
            .eq("id", request_id)
            .execute()?;
        updated.data.first().map(BloodRequest::from_row).transpose()
    }

    pub fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        let rows = self
            .client
            .from(TableName::Notifications)
            .select("*")
            .eq("user_id", user_id)
            .execute()?
            .data;
        Ok(rows.iter().filter_map(parse_logged).collect())
    }

    pub fn unread_notification_count(&self, user_id: &str) -> Result<usize> {
        let response = self
            .client
            .from(TableName::Notifications)
            .select_with("*", SelectOptions::head_count())
            .eq("user_id", user_id)
            .eq("read", false)
            .execute()?;
        Ok(response.count.unwrap_or(0))
    }

    /// Returns `false` if no notification has that id.
    pub fn mark_notification_read(&self, notification_id: &str) -> Result<bool> {
        let updated = self
            .client
            .from(TableName::Notifications)
            .update(Row::new().with("read", true))
            .eq("id", notification_id)
            .execute()?;
        Ok(!updated.data.is_empty())
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let donors = self.client.from(TableName::DonorProfiles).select("*").execute()?.data;
        let requests = self.client.from(TableName::BloodRequests).select("*").execute()?.data;

        let available_donors = donors
            .iter()
            .filter(|row| row.column_equals("is_available", &true.into()))
            .count();
        let pending_requests = requests
            .iter()
            .filter(|row| row.column_equals("status", &RequestStatus::Pending.as_str().into()))
            .count();

        Ok(DashboardStats {
            total_donors: donors.len(),
            available_donors,
            total_requests: requests.len(),
            pending_requests,
        })
    }

    /// Inserts the starting profile unless one with the same id is stored.
    fn create_initial_profile(&self, user: &UserRecord, role: Role) -> Result<()> {
        let (table, row) = match role {
            Role::Donor => (
                TableName::DonorProfiles,
                DonorProfile::initial(&user.id, &user.full_name, &user.email).to_row()?,
            ),
            Role::Seeker => (
                TableName::SeekerProfiles,
                SeekerProfile::initial(&user.id, &user.full_name, &user.email).to_row()?,
            ),
            Role::Admin => return Ok(()),
        };

        let profile_id = row.id().unwrap_or_default().to_string();
        let existing = self.client.from(table).select("id").eq("id", profile_id.as_str()).single()?;
        if existing.is_some() {
            debug!("Profile {profile_id} already exists in {table}");
            return Ok(());
        }

        self.client.from(table).insert(row).execute()?;
        Ok(())
    }

    /// Moves a pending email-keyed role onto `user` and creates the pending
    /// profile. Bridge entries are dropped only once their row is written.
    fn reconcile_pending(&self, user: &UserRecord) -> Result<Option<Role>> {
        let store = self.client.store();
        let keys = self.client.keys();

        let mut roles: BTreeMap<String, Role> =
            read_json(store, &keys.roles_by_email()).unwrap_or_default();
        let Some(role) = roles.get(&user.email).copied() else {
            return Ok(None);
        };

        self.assign_role(&user.id, role)?;
        roles.remove(&user.email);
        write_json(store, &keys.roles_by_email(), &roles)?;

        let mut pending: BTreeMap<String, PendingProfile> =
            read_json(store, &keys.pending_profiles()).unwrap_or_default();
        if let Some(profile) = pending.get(&user.email).cloned() {
            let with_details = UserRecord {
                full_name: profile.full_name,
                email: profile.email,
                ..user.clone()
            };
            match self.create_initial_profile(&with_details, role) {
                Ok(()) => {
                    pending.remove(&user.email);
                    write_json(store, &keys.pending_profiles(), &pending)?;
                }
                Err(e) => warn!("Pending profile for {} not created: {e}", user.email),
            }
        }

        info!("Reconciled pending {role} sign-up for {}", user.email);
        Ok(Some(role))
    }
}

fn parse_logged<T: Record>(row: &Row) -> Option<T> {
    match T::from_row(row) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping row {:?}: {e}", row.id());
            None
        }
    }
}

fn first_record<T: Record>(rows: Vec<Row>) -> Result<T> {
    let row = rows.into_iter().next().ok_or_else(|| StoreError::InvalidRecord {
        table: T::TABLE.to_string(),
        reason: "insert returned no rows".to_string(),
    })?;
    T::from_row(&row)
}
