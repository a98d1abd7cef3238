//! Name → customer → deal resolution.
//!
//! One [`ConversationTurn`] is created per request and walks
//! `Start → ResolvingCustomer → {Disambiguating | FetchingDeal} → Done`.
//! Calls are strictly sequential: the deal lookup needs the resolved id.
//! Nothing survives the turn, so a disambiguation choice has to come back
//! as an explicit customer id on the next request.

use std::fmt::Write as _;

use dealdesk_core::{CustomerId, CustomerMatch, DealRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::intent::{DealRequest, Target, CLARIFYING_QUESTION};
use crate::matches::parse_customer_matches;
use crate::result::{ToolFailure, ToolResult};
use crate::runtime::AgentError;
use crate::tools::DealTools;

pub const NO_MATCHING_CUSTOMER: &str = "No matching customer found.";
pub const NO_DEAL_FOUND: &str = "No deal found for this customer.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Start,
    ResolvingCustomer,
    Disambiguating,
    FetchingDeal,
    Done,
}

impl ResolutionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ResolvingCustomer => "resolving_customer",
            Self::Disambiguating => "disambiguating",
            Self::FetchingDeal => "fetching_deal",
            Self::Done => "done",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub original_query: String,
    pub resolved_customer_id: Option<CustomerId>,
    pub resolved_company_name: Option<String>,
    pub disambiguation_candidates: Vec<CustomerMatch>,
    pub deal: Option<DealRecord>,
    pub final_answer: Option<String>,
    pub state: ResolutionState,
}

impl ConversationTurn {
    pub fn new(original_query: impl Into<String>) -> Self {
        Self {
            original_query: original_query.into(),
            resolved_customer_id: None,
            resolved_company_name: None,
            disambiguation_candidates: Vec::new(),
            deal: None,
            final_answer: None,
            state: ResolutionState::Start,
        }
    }

    pub fn answer(&self) -> &str {
        self.final_answer.as_deref().unwrap_or_default()
    }

    fn transition(&mut self, next: ResolutionState) {
        debug!(
            event_name = "agent.resolution.transition",
            from = self.state.as_str(),
            to = next.as_str(),
            "resolution state changed"
        );
        self.state = next;
    }

    fn finish(&mut self, state: ResolutionState, answer: String) {
        self.transition(state);
        self.final_answer = Some(answer);
    }
}

/// The decision procedure the deal agent follows for one request.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolutionPolicy;

impl ResolutionPolicy {
    pub async fn run<T>(
        &self,
        tools: &T,
        request: &DealRequest,
    ) -> Result<ConversationTurn, AgentError>
    where
        T: DealTools + ?Sized,
    {
        let mut turn = ConversationTurn::new(request.query.clone());

        let customer = match request.target() {
            Target::Customer(customer_id) => Some(CustomerMatch {
                id: customer_id,
                company_name: String::new(),
            }),
            Target::Company(company_name) => {
                self.resolve_customer(tools, &mut turn, &company_name).await?
            }
            Target::Unresolved => {
                turn.finish(ResolutionState::Done, CLARIFYING_QUESTION.to_string());
                None
            }
        };

        if let Some(customer) = customer {
            self.fetch_deal(tools, &mut turn, customer).await?;
        }

        info!(
            event_name = "agent.resolution.completed",
            state = turn.state.as_str(),
            customer_id = turn.resolved_customer_id.map(CustomerId::get),
            candidates = turn.disambiguation_candidates.len(),
            "resolution finished"
        );
        Ok(turn)
    }

    /// Returns the single matching customer, or `None` once the turn has
    /// been finished with a not-found or disambiguation answer.
    async fn resolve_customer<T>(
        &self,
        tools: &T,
        turn: &mut ConversationTurn,
        company_name: &str,
    ) -> Result<Option<CustomerMatch>, AgentError>
    where
        T: DealTools + ?Sized,
    {
        turn.transition(ResolutionState::ResolvingCustomer);
        let query = format!("Get customer ID for {company_name}");

        let payload = match tools.query_sales_agent(&query).await {
            ToolResult::Success(payload) => payload,
            ToolResult::Failure(failure) => {
                overload_guard(&failure)?;
                let answer = format!(
                    "{NO_MATCHING_CUSTOMER} The customer lookup for {company_name} failed: {}",
                    failure.message
                );
                turn.finish(ResolutionState::Done, answer);
                return Ok(None);
            }
        };

        let mut matches = parse_customer_matches(&payload);
        match matches.len() {
            0 => {
                turn.finish(ResolutionState::Done, NO_MATCHING_CUSTOMER.to_string());
                Ok(None)
            }
            1 => Ok(matches.pop()),
            _ => {
                let answer = disambiguation_answer(company_name, &matches);
                turn.disambiguation_candidates = matches;
                turn.finish(ResolutionState::Disambiguating, answer);
                Ok(None)
            }
        }
    }

    async fn fetch_deal<T>(
        &self,
        tools: &T,
        turn: &mut ConversationTurn,
        customer: CustomerMatch,
    ) -> Result<(), AgentError>
    where
        T: DealTools + ?Sized,
    {
        turn.transition(ResolutionState::FetchingDeal);
        turn.resolved_customer_id = Some(customer.id);
        if !customer.company_name.is_empty() {
            turn.resolved_company_name = Some(customer.company_name.clone());
        }

        let deal = match tools.get_deal_by_customer_id(customer.id).await {
            ToolResult::Success(payload) => DealRecord(payload),
            ToolResult::Failure(failure) => {
                overload_guard(&failure)?;
                turn.finish(ResolutionState::Done, no_deal_answer(customer.id));
                return Ok(());
            }
        };

        if !deal.has_bid_sections() {
            turn.finish(ResolutionState::Done, no_deal_answer(customer.id));
            return Ok(());
        }

        let answer = deal_answer(&customer, &deal);
        turn.deal = Some(deal);
        turn.finish(ResolutionState::Done, answer);
        Ok(())
    }
}

fn overload_guard(failure: &ToolFailure) -> Result<(), AgentError> {
    if failure.is_overloaded() {
        return Err(AgentError::Overloaded(failure.message.clone()));
    }
    Ok(())
}

fn disambiguation_answer(company_name: &str, candidates: &[CustomerMatch]) -> String {
    let mut answer = format!(
        "Several customers match \"{company_name}\". Which one do you mean? \
         Reply with the customer id:"
    );
    for candidate in candidates {
        let _ = write!(answer, "\n- {}: {}", candidate.id, candidate.company_name);
    }
    answer
}

fn no_deal_answer(customer_id: CustomerId) -> String {
    format!(
        "{NO_DEAL_FOUND} Check that customer id {customer_id} is correct, \
         or search by company name to find the right customer."
    )
}

/// Summary line, then the bid header and bid account fields exactly as the
/// deal document carries them.
fn deal_answer(customer: &CustomerMatch, deal: &DealRecord) -> String {
    let mut answer = if customer.company_name.is_empty() {
        format!("Deal for customer id {}.", customer.id)
    } else {
        format!("Deal for {} (customer id {}).", customer.company_name, customer.id)
    };

    let sections = [("Bid header", deal.header_fields()), ("Bid account", deal.account_fields())];
    for (title, fields) in sections {
        if fields.is_empty() {
            continue;
        }
        let _ = write!(answer, "\n{title}:");
        for (key, value) in fields {
            let _ = write!(answer, "\n- {key}: {value}");
        }
    }
    answer
}
