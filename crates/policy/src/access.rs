//! Role-tiered access decisions

use casepay_core::{Actor, ActorId, Case, Role};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::error::{PolicyError, PolicyResult};

/// What an actor can see
///
/// - customers: cases they own
/// - operators: unassigned cases and cases assigned to them
/// - administrators: everything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    OwnedBy(ActorId),
    UnassignedOr(ActorId),
}

impl Visibility {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Customer => Visibility::OwnedBy(actor.id.clone()),
            Role::Operator => Visibility::UnassignedOr(actor.id.clone()),
            Role::Administrator => Visibility::All,
        }
    }

    pub fn matches(&self, case: &Case) -> bool {
        match self {
            Visibility::All => true,
            Visibility::OwnedBy(owner) => case.owner == *owner,
            Visibility::UnassignedOr(operator) => match &case.assigned_operator {
                None => true,
                Some(assigned) => assigned == operator,
            },
        }
    }

    /// Keep only visible cases
    pub fn filter<'c>(&self, cases: impl IntoIterator<Item = &'c Case>) -> Vec<&'c Case> {
        cases.into_iter().filter(|case| self.matches(case)).collect()
    }
}

/// Guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReadCase,
    CreateCase,
    CreatePayment,
    SearchPayments,
    ResolvePayment,
    TransitionStatus,
    AssignOperator,
    ReadAudit,
    /// Hard-block or unblock an identity at the rate limiter
    ManageLimits,
}

fn role_allows(actor: &Actor, capability: Capability, case: Option<&Case>) -> bool {
    match capability {
        Capability::ReadCase => true,
        Capability::CreateCase => matches!(actor.role, Role::Customer | Role::Administrator),
        Capability::CreatePayment => match actor.role {
            Role::Customer => case.is_some_and(|case| case.owner == actor.id),
            Role::Operator => false,
            Role::Administrator => true,
        },
        Capability::SearchPayments
        | Capability::ResolvePayment
        | Capability::TransitionStatus
        | Capability::ReadAudit => actor.role.is_staff(),
        Capability::AssignOperator | Capability::ManageLimits => actor.role == Role::Administrator,
    }
}

/// Decision only. A target case must also be visible to the actor.
pub fn can(actor: &Actor, capability: Capability, case: Option<&Case>) -> bool {
    let visible = case.map_or(true, |case| Visibility::for_actor(actor).matches(case));
    visible && role_allows(actor, capability, case)
}

/// Like [`can`] but returns the denial as an error. Invisible targets are
/// reported as `NotVisible` before any role check.
pub fn authorize(actor: &Actor, capability: Capability, case: Option<&Case>) -> PolicyResult<()> {
    if let Some(case) = case {
        if !Visibility::for_actor(actor).matches(case) {
            tracing::warn!(
                actor = %actor.id,
                role = %actor.role,
                case_id = %case.id,
                capability = %capability,
                "case outside actor visibility"
            );
            return Err(PolicyError::NotVisible(case.id.to_string()));
        }
    }

    if role_allows(actor, capability, case) {
        return Ok(());
    }

    tracing::warn!(
        actor = %actor.id,
        role = %actor.role,
        capability = %capability,
        "access denied"
    );
    Err(PolicyError::Forbidden {
        actor: actor.id.clone(),
        role: actor.role,
        capability,
    })
}

/// Customers open cases for themselves; administrators for anyone
pub fn authorize_create_case(actor: &Actor, owner: &ActorId) -> PolicyResult<()> {
    authorize(actor, Capability::CreateCase, None)?;
    if actor.role == Role::Customer && actor.id != *owner {
        tracing::warn!(actor = %actor.id, owner = %owner, "customer creating case for another owner");
        return Err(PolicyError::Forbidden {
            actor: actor.id.clone(),
            role: actor.role,
            capability: Capability::CreateCase,
        });
    }
    Ok(())
}

/// Only operators can be assigned to a case
pub fn validate_assignee(assignee: &Actor) -> PolicyResult<()> {
    if assignee.role == Role::Operator {
        Ok(())
    } else {
        Err(PolicyError::InvalidAssignee(assignee.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casepay_core::{CaseDetails, CaseKind};
    use chrono::Utc;
    use strum::IntoEnumIterator;

    fn case_owned_by(owner: &str) -> Case {
        Case::new(
            ActorId::new(owner),
            CaseKind::SupportTicket,
            CaseDetails::titled("Cannot log in"),
            Utc::now(),
        )
    }

    #[test]
    fn test_customer_sees_only_own_cases() {
        let alice = Actor::customer("alice");
        let visibility = Visibility::for_actor(&alice);
        assert!(visibility.matches(&case_owned_by("alice")));
        assert!(!visibility.matches(&case_owned_by("bob")));
    }

    #[test]
    fn test_operator_sees_unassigned_and_own() {
        let op = Actor::operator("op-1");
        let visibility = Visibility::for_actor(&op);

        let mut case = case_owned_by("alice");
        assert!(visibility.matches(&case));

        case.assigned_operator = Some(ActorId::new("op-1"));
        assert!(visibility.matches(&case));

        case.assigned_operator = Some(ActorId::new("op-2"));
        assert!(!visibility.matches(&case));
    }

    #[test]
    fn test_administrator_sees_all() {
        let mut case = case_owned_by("alice");
        case.assigned_operator = Some(ActorId::new("op-2"));
        assert!(Visibility::for_actor(&Actor::administrator("root")).matches(&case));
    }

    #[test]
    fn test_list_filter_and_fetch_agree() {
        let mut assigned_elsewhere = case_owned_by("carol");
        assigned_elsewhere.assigned_operator = Some(ActorId::new("op-2"));
        let cases = vec![case_owned_by("alice"), case_owned_by("bob"), assigned_elsewhere];

        for actor in [
            Actor::customer("alice"),
            Actor::operator("op-1"),
            Actor::administrator("root"),
        ] {
            let visibility = Visibility::for_actor(&actor);
            let listed: Vec<_> = visibility.filter(&cases).iter().map(|c| c.id.clone()).collect();
            for case in &cases {
                let fetchable = authorize(&actor, Capability::ReadCase, Some(case)).is_ok();
                assert_eq!(listed.contains(&case.id), fetchable, "{:?}", actor);
            }
        }
    }

    #[test]
    fn test_invisible_fetch_reports_not_found() {
        let case = case_owned_by("bob");
        let err = authorize(&Actor::customer("alice"), Capability::ReadCase, Some(&case)).unwrap_err();
        assert_eq!(err.kind(), casepay_core::ErrorKind::NotFound);
    }

    #[test]
    fn test_staff_only_capabilities() {
        let case = case_owned_by("alice");
        let customer = Actor::customer("alice");
        let operator = Actor::operator("op-1");

        for capability in [
            Capability::ResolvePayment,
            Capability::SearchPayments,
            Capability::TransitionStatus,
            Capability::ReadAudit,
        ] {
            assert!(!can(&customer, capability, Some(&case)), "{}", capability);
            assert!(can(&operator, capability, Some(&case)), "{}", capability);
        }
    }

    #[test]
    fn test_assignment_is_administrator_only() {
        let case = case_owned_by("alice");
        assert!(!can(&Actor::operator("op-1"), Capability::AssignOperator, Some(&case)));
        assert!(can(&Actor::administrator("root"), Capability::AssignOperator, Some(&case)));
        assert!(!can(&Actor::operator("op-1"), Capability::ManageLimits, None));

        let err = authorize(&Actor::operator("op-1"), Capability::AssignOperator, Some(&case))
            .unwrap_err();
        assert_eq!(err.tag(), "Forbidden");
    }

    #[test]
    fn test_payment_creation_by_owner_or_admin() {
        let case = case_owned_by("alice");
        assert!(can(&Actor::customer("alice"), Capability::CreatePayment, Some(&case)));
        assert!(!can(&Actor::customer("bob"), Capability::CreatePayment, Some(&case)));
        assert!(!can(&Actor::operator("op-1"), Capability::CreatePayment, Some(&case)));
        assert!(can(&Actor::administrator("root"), Capability::CreatePayment, Some(&case)));
    }

    #[test]
    fn test_case_creation_owner_rules() {
        let alice = ActorId::new("alice");
        assert!(authorize_create_case(&Actor::customer("alice"), &alice).is_ok());
        assert!(authorize_create_case(&Actor::customer("bob"), &alice).is_err());
        assert!(authorize_create_case(&Actor::operator("op-1"), &alice).is_err());
        assert!(authorize_create_case(&Actor::administrator("root"), &alice).is_ok());
    }

    #[test]
    fn test_assignee_must_be_operator() {
        assert!(validate_assignee(&Actor::operator("op-1")).is_ok());
        assert_eq!(
            validate_assignee(&Actor::customer("alice")),
            Err(PolicyError::InvalidAssignee(ActorId::new("alice")))
        );
    }

    #[test]
    fn test_administrator_holds_every_capability() {
        let case = case_owned_by("alice");
        let root = Actor::administrator("root");
        for capability in Capability::iter() {
            assert!(can(&root, capability, Some(&case)), "{}", capability);
        }
    }
}
