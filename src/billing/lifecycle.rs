//! Ciclo de vida do cliente guiado pela inadimplência.
//!
//! `evaluate_client_status()` é a única função que decide o status automático
//! de um cliente. Mesmas entradas, mesma saída: a varredura pode rodar quantas
//! vezes quiser no mesmo dia sem produzir mudanças novas.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::clients::ClientStatus;

/// Prazos (em dias de atraso) que movem o cliente pelo funil de cobrança.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPolicy {
    /// Atraso tolerado antes de virar INADIMPLENTE.
    pub grace_period_days: i64,
    /// Atraso a partir do qual o cliente é BLOQUEADO.
    pub block_after_days: i64,
    /// Atraso a partir do qual o cliente é CANCELADO. `None` desliga o cancelamento automático.
    pub cancel_after_days: Option<i64>,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            grace_period_days: 5,
            block_after_days: 15,
            cancel_after_days: Some(60),
        }
    }
}

impl BillingPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.grace_period_days < 0 {
            return Err("GRACE_PERIOD_DAYS não pode ser negativo".into());
        }
        if self.block_after_days < self.grace_period_days {
            return Err("BLOCK_AFTER_DAYS deve ser >= GRACE_PERIOD_DAYS".into());
        }
        if let Some(cancel) = self.cancel_after_days {
            if cancel < self.block_after_days {
                return Err("CANCEL_AFTER_DAYS deve ser >= BLOCK_AFTER_DAYS".into());
            }
        }
        Ok(())
    }
}

/// O que o motor precisa saber sobre um cliente para decidir o status.
#[derive(Debug, Clone, Copy)]
pub struct ClientBillingSnapshot {
    pub status: ClientStatus,
    pub trial_ends_at: Option<NaiveDate>,
    /// Vencimento da cobrança em aberto (PENDENTE/VENCIDO) mais antiga.
    pub oldest_unpaid_due_date: Option<NaiveDate>,
    /// Já existe algum pagamento confirmado para o cliente?
    pub has_confirmed_payment: bool,
}

impl ClientBillingSnapshot {
    fn trial_running(&self, today: NaiveDate) -> bool {
        self.trial_ends_at.is_some_and(|end| today <= end)
    }

    /// Data a partir da qual o cliente está devendo, se estiver.
    pub fn debt_anchor(&self, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(due) = self.oldest_unpaid_due_date.filter(|due| *due < today) {
            return Some(due);
        }

        // Trial acabou sem nenhum pagamento: a dívida conta do fim do trial
        match self.trial_ends_at {
            Some(end) if end < today && !self.has_confirmed_payment => Some(end),
            _ => None,
        }
    }
}

/// Dias de atraso contados a partir do vencimento (nunca negativo).
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days().max(0)
}

/// Status que o cliente deveria ter hoje.
pub fn evaluate_client_status(
    snapshot: &ClientBillingSnapshot,
    policy: &BillingPolicy,
    today: NaiveDate,
) -> ClientStatus {
    if snapshot.status == ClientStatus::Cancelado {
        return ClientStatus::Cancelado;
    }

    let Some(anchor) = snapshot.debt_anchor(today) else {
        return if snapshot.status == ClientStatus::EmTrial && snapshot.trial_running(today) {
            ClientStatus::EmTrial
        } else if snapshot.status == ClientStatus::EmTrial && !snapshot.has_confirmed_payment {
            // Trial sem data de término e nada pago ainda
            ClientStatus::EmTrial
        } else {
            ClientStatus::Ativo
        };
    };

    let overdue = days_overdue(anchor, today);

    if overdue <= policy.grace_period_days {
        return match snapshot.status {
            ClientStatus::EmTrial | ClientStatus::Ativo => snapshot.status,
            _ => ClientStatus::Ativo,
        };
    }

    if overdue <= policy.block_after_days {
        return ClientStatus::Inadimplente;
    }

    match policy.cancel_after_days {
        Some(limit) if overdue > limit => ClientStatus::Cancelado,
        _ => ClientStatus::Bloqueado,
    }
}

/// Igual a `evaluate_client_status`, mas só devolve algo quando há mudança.
pub fn next_client_status(
    snapshot: &ClientBillingSnapshot,
    policy: &BillingPolicy,
    today: NaiveDate,
) -> Option<ClientStatus> {
    let target = evaluate_client_status(snapshot, policy, today);
    (target != snapshot.status).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClientStatus::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn snapshot(status: ClientStatus) -> ClientBillingSnapshot {
        ClientBillingSnapshot {
            status,
            trial_ends_at: None,
            oldest_unpaid_due_date: None,
            has_confirmed_payment: true,
        }
    }

    fn with_debt(status: ClientStatus, due: NaiveDate) -> ClientBillingSnapshot {
        ClientBillingSnapshot { oldest_unpaid_due_date: Some(due), ..snapshot(status) }
    }

    #[test]
    fn default_policy_is_consistent() {
        assert!(BillingPolicy::default().validate().is_ok());
    }

    #[test]
    fn policy_rejects_inverted_limits() {
        let policy = BillingPolicy { grace_period_days: 10, block_after_days: 5, cancel_after_days: None };
        assert!(policy.validate().is_err());

        let policy = BillingPolicy { grace_period_days: 5, block_after_days: 15, cancel_after_days: Some(10) };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn trial_is_kept_while_running() {
        let snap = ClientBillingSnapshot {
            status: EmTrial,
            trial_ends_at: Some(day(20)),
            oldest_unpaid_due_date: None,
            has_confirmed_payment: false,
        };
        assert_eq!(evaluate_client_status(&snap, &BillingPolicy::default(), day(10)), EmTrial);
        assert_eq!(evaluate_client_status(&snap, &BillingPolicy::default(), day(20)), EmTrial);
    }

    #[test]
    fn expired_trial_without_payment_escalates_after_grace() {
        let policy = BillingPolicy::default();
        let snap = ClientBillingSnapshot {
            status: EmTrial,
            trial_ends_at: Some(day(1)),
            oldest_unpaid_due_date: None,
            has_confirmed_payment: false,
        };

        // dentro da carência continua em trial
        assert_eq!(evaluate_client_status(&snap, &policy, day(6)), EmTrial);
        // passou da carência
        assert_eq!(evaluate_client_status(&snap, &policy, day(7)), Inadimplente);
        assert_eq!(evaluate_client_status(&snap, &policy, day(17)), Bloqueado);
    }

    #[test]
    fn expired_trial_with_payment_becomes_active() {
        let snap = ClientBillingSnapshot {
            status: EmTrial,
            trial_ends_at: Some(day(1)),
            oldest_unpaid_due_date: None,
            has_confirmed_payment: true,
        };
        assert_eq!(next_client_status(&snap, &BillingPolicy::default(), day(2)), Some(Ativo));
    }

    #[test]
    fn active_client_escalates_by_days_overdue() {
        let policy = BillingPolicy::default();
        let snap = with_debt(Ativo, day(1));

        assert_eq!(evaluate_client_status(&snap, &policy, day(1)), Ativo);
        assert_eq!(evaluate_client_status(&snap, &policy, day(6)), Ativo); // 5 dias = carência
        assert_eq!(evaluate_client_status(&snap, &policy, day(7)), Inadimplente);
        assert_eq!(evaluate_client_status(&snap, &policy, day(16)), Inadimplente); // 15 dias
        assert_eq!(evaluate_client_status(&snap, &policy, day(17)), Bloqueado);
    }

    #[test]
    fn long_debt_cancels_when_enabled() {
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let snap = with_debt(Bloqueado, due);

        assert_eq!(evaluate_client_status(&snap, &BillingPolicy::default(), today), Cancelado);

        let no_cancel = BillingPolicy { cancel_after_days: None, ..BillingPolicy::default() };
        assert_eq!(evaluate_client_status(&snap, &no_cancel, today), Bloqueado);
    }

    #[test]
    fn paying_the_debt_reactivates() {
        let policy = BillingPolicy::default();
        assert_eq!(next_client_status(&snapshot(Inadimplente), &policy, day(20)), Some(Ativo));
        assert_eq!(next_client_status(&snapshot(Bloqueado), &policy, day(20)), Some(Ativo));
    }

    #[test]
    fn recent_debt_within_grace_does_not_keep_client_delinquent() {
        let snap = with_debt(Bloqueado, day(18));
        assert_eq!(evaluate_client_status(&snap, &BillingPolicy::default(), day(20)), Ativo);
    }

    #[test]
    fn cancelled_is_terminal_for_automation() {
        let snap = snapshot(Cancelado);
        assert_eq!(next_client_status(&snap, &BillingPolicy::default(), day(20)), None);
    }

    #[test]
    fn future_due_dates_are_not_debt() {
        let snap = with_debt(Ativo, day(25));
        assert_eq!(snap.debt_anchor(day(20)), None);
        assert_eq!(next_client_status(&snap, &BillingPolicy::default(), day(20)), None);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let policy = BillingPolicy::default();
        let mut snap = with_debt(Ativo, day(1));

        let first = next_client_status(&snap, &policy, day(10)).expect("mudança");
        snap.status = first;
        assert_eq!(next_client_status(&snap, &policy, day(10)), None);
    }

    #[test]
    fn days_overdue_never_negative() {
        assert_eq!(days_overdue(day(10), day(5)), 0);
        assert_eq!(days_overdue(day(5), day(10)), 5);
    }
}
