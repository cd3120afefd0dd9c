//! Usage route declarations.
//!
//! Each route is data: where it is mounted, which chain family and SQL
//! templates it runs, and the contracts its path and query parameters must
//! satisfy.

use chaingate_common::config::QueryLimits;
use chaingate_common::networks::ChainType;
use chaingate_core::contract::rules::{
    EnumRule, EvmAddressRule, IntegerRule, NetworkIdRule, SvmAddressRule, TimestampRule,
};
use chaingate_core::contract::{ContractBuilder, FieldDoc, FieldSpec, QueryContract};
use chaingate_core::orchestrator::UsageRequest;
use chaingate_core::value::ParamsRecord;
use chaingate_error::Result;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Mount path relative to the API prefix, axum syntax
    pub path: &'static str,
    pub chain: ChainType,
    pub queries: Vec<String>,
    pub path_contract: QueryContract,
    pub query_contract: QueryContract,
    /// Backend settings sent with every call of this route
    pub settings: Vec<(&'static str, &'static str)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteDoc {
    pub path: String,
    pub chain: ChainType,
    pub path_params: Vec<FieldDoc>,
    pub query_params: Vec<FieldDoc>,
}

impl RouteSpec {
    fn new(
        path: &'static str,
        chain: ChainType,
        queries: &[&str],
        path_contract: QueryContract,
        query_contract: QueryContract,
    ) -> Self {
        Self {
            path,
            chain,
            queries: queries.iter().map(|q| q.to_string()).collect(),
            path_contract,
            query_contract,
            settings: Vec::new(),
        }
    }

    fn with_setting(mut self, key: &'static str, value: &'static str) -> Self {
        self.settings.push((key, value));
        self
    }

    pub fn request(&self, path: ParamsRecord, query: ParamsRecord) -> UsageRequest {
        self.settings.iter().fold(
            UsageRequest::new(self.chain, self.queries.iter().cloned())
                .with_path(path)
                .with_query(query),
            |request, (key, value)| request.with_setting(*key, *value),
        )
    }

    pub fn doc(&self, prefix: &str) -> RouteDoc {
        RouteDoc {
            path: format!("{}{}", prefix, self.path),
            chain: self.chain,
            path_params: self.path_contract.docs(),
            query_params: self.query_contract.docs(),
        }
    }
}

fn network() -> FieldSpec {
    FieldSpec::new("network", NetworkIdRule)
        .describe("Network identifier")
        .example("mainnet")
}

fn start_time() -> FieldSpec {
    FieldSpec::new("start_time", TimestampRule)
        .input_prefault("2015-07-30")
        .describe("Inclusive lower bound, unix seconds or RFC 3339")
        .example("2025-01-01")
}

fn end_time() -> FieldSpec {
    FieldSpec::new("end_time", TimestampRule)
        .input_prefault("2100-01-01")
        .describe("Exclusive upper bound, unix seconds or RFC 3339")
        .example("2025-02-01")
}

fn order() -> FieldSpec {
    FieldSpec::new("order", EnumRule::new(&["asc", "desc"]))
        .output_default("desc")
        .describe("Sort direction by timestamp")
}

fn no_path(limits: QueryLimits) -> Result<QueryContract> {
    ContractBuilder::new(limits).include_pagination(false).build()
}

/// Every usage route served under the API prefix.
pub fn usage_routes(limits: QueryLimits) -> Result<Vec<RouteSpec>> {
    Ok(vec![
        RouteSpec::new(
            "/evm/balances",
            ChainType::Evm,
            &["balances"],
            no_path(limits)?,
            ContractBuilder::new(limits)
                .field(network())
                .field(
                    FieldSpec::new("address", EvmAddressRule)
                        .batched()
                        .describe("Wallet addresses")
                        .example("0xd8da6bf26964af9d7eed9e03e53415d37aa96045"),
                )
                .field(
                    FieldSpec::new("min_balance", IntegerRule::at_least(0))
                        .output_default(0u64)
                        .describe("Hide balances below this raw amount"),
                )
                .build()?,
        ),
        RouteSpec::new(
            "/evm/transfers",
            ChainType::Evm,
            &["transfers"],
            no_path(limits)?,
            ContractBuilder::new(limits)
                .field(network())
                .field(
                    FieldSpec::new("contract", EvmAddressRule)
                        .batched()
                        .describe("Token contract addresses")
                        .example("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
                )
                .field(start_time())
                .field(end_time())
                .field(order())
                .build()?,
        ),
        RouteSpec::new(
            "/evm/holders/{contract}",
            ChainType::Evm,
            &["holders"],
            ContractBuilder::new(limits)
                .include_pagination(false)
                .field(
                    FieldSpec::new("contract", EvmAddressRule)
                        .describe("Token contract address")
                        .example("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
                )
                .build()?,
            ContractBuilder::new(limits).field(network()).build()?,
        )
        .with_setting("optimize_aggregation_in_order", "1"),
        RouteSpec::new(
            "/svm/transfers",
            ChainType::Svm,
            &["transfers"],
            no_path(limits)?,
            ContractBuilder::new(limits)
                .field(network())
                .field(
                    FieldSpec::new("mint", SvmAddressRule)
                        .batched()
                        .describe("Token mint addresses")
                        .example("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
                )
                .field(start_time())
                .field(end_time())
                .field(order())
                .build()?,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaingate_core::value::{ParamValue, RawParams};

    fn route(path: &str) -> RouteSpec {
        usage_routes(QueryLimits::default())
            .unwrap()
            .into_iter()
            .find(|r| r.path == path)
            .unwrap()
    }

    #[test]
    fn test_routes_build() {
        let routes = usage_routes(QueryLimits::default()).unwrap();
        assert_eq!(routes.len(), 4);
    }

    #[test]
    fn test_transfers_defaults_are_filled() {
        let params = route("/evm/transfers")
            .query_contract
            .validate(&RawParams::from_query_string(
                "network=mainnet&contract=0xA0b86991c6218b36c1d19d4a2e9eb0ce3606eB48",
            ))
            .unwrap();

        assert_eq!(params.get_u64("start_time"), Some(1438214400));
        assert_eq!(params.get_str("order"), Some("desc"));
        assert_eq!(params.get_u64("limit"), Some(10));
        assert_eq!(params.get_u64("page"), Some(1));
        assert_eq!(
            params.get("contract"),
            Some(&ParamValue::List(vec![ParamValue::Text(
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string()
            )]))
        );
    }

    #[test]
    fn test_route_settings_reach_request() {
        let request = route("/evm/holders/{contract}")
            .request(ParamsRecord::new(), ParamsRecord::new());
        assert_eq!(
            request.settings.get("optimize_aggregation_in_order").map(String::as_str),
            Some("1")
        );

        let request = route("/evm/balances").request(ParamsRecord::new(), ParamsRecord::new());
        assert!(request.settings.is_empty());
    }

    #[test]
    fn test_balances_requires_address() {
        let err = route("/evm/balances")
            .query_contract
            .validate(&RawParams::from_query_string("network=mainnet"))
            .unwrap_err();
        assert!(err.message.contains("address"));
    }
}
