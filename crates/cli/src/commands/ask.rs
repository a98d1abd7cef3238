use dealdesk_agent::{answer, AgentError, DealAgent, DealRequest};
use dealdesk_core::config::{AppConfig, LoadOptions};
use dealdesk_core::{ApplicationError, CustomerId};

use crate::commands::{
    CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT, EXIT_RUNTIME, EXIT_UNAVAILABLE,
};

const COMMAND: &str = "ask";

#[derive(Debug, Clone, Default)]
pub struct AskArgs {
    pub query: String,
    pub customer_id: Option<i64>,
    pub company: Option<String>,
}

impl AskArgs {
    fn into_request(self) -> Result<DealRequest, ApplicationError> {
        let mut request = DealRequest::new(self.query);
        request.validate()?;
        if let Some(raw) = self.customer_id {
            request = request.with_customer_id(CustomerId::new(raw)?);
        }
        if let Some(company) = self.company {
            request = request.with_company_name(company);
        }
        Ok(request)
    }
}

pub fn run(args: AskArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    runtime.block_on(ask_with_config(&config, args))
}

/// Answers one question against the backends named in `config`.
pub async fn ask_with_config(config: &AppConfig, args: AskArgs) -> CommandResult {
    let request = match args.into_request() {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_input",
                error.to_string(),
                EXIT_INVALID_INPUT,
            )
        }
    };

    let agent = match DealAgent::from_config(&config.backends) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure(COMMAND, "runtime", error.to_string(), EXIT_RUNTIME)
        }
    };

    match answer(&agent, request).await {
        Ok(response) => CommandResult::success(COMMAND, response),
        Err(error @ AgentError::Overloaded(_)) => {
            CommandResult::failure(COMMAND, "overloaded", error.to_string(), EXIT_UNAVAILABLE)
        }
        Err(error @ AgentError::Runtime(_)) => {
            CommandResult::failure(COMMAND, "runtime", error.to_string(), EXIT_RUNTIME)
        }
    }
}
