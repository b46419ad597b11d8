//! Simulation input snapshot
//!
//! A [`SimulationInput`] is supplied whole by the caller (usually parsed from
//! JSON) and is never mutated by the engine. Calculators read it through
//! [`Figures`], which quantizes every monetary value and rate once.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::rounding::round_money;

/// Company the snapshot belongs to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub tax_id: String, // CNPJ, any punctuation
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub primary_activity: String, // CNAE code
    #[serde(default)]
    pub declared_regime: Option<String>,
}

/// A slice of a revenue stream assigned to a Simples Nacional annex
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApportionmentLine {
    #[serde(default)]
    pub annex: Option<u32>,
    pub value: Decimal,
}

/// Revenue streams that can be apportioned across annexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevenueStream {
    Goods,
    Services,
}

impl RevenueStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueStream::Goods => "goods",
            RevenueStream::Services => "services",
        }
    }
}

impl fmt::Display for RevenueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time financial snapshot of one business
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationInput {
    pub id: i64,
    pub company: Company,

    // Revenue
    pub total_revenue: Decimal,
    pub goods_revenue: Decimal,
    pub services_revenue: Decimal,
    pub export_revenue: Decimal,
    pub trailing_12m_revenue: Decimal,

    // Payroll and employer contribution
    pub payroll_total: Decimal,
    pub employer_contribution: Decimal,
    pub employer_contribution_rate: Decimal, // %, INSS + RAT + third parties
    pub payroll_exemption: bool,
    pub alternative_contribution: bool,
    pub alternative_contribution_rate: Decimal, // %, revenue based

    // Manually supplied rates (%)
    pub iss_rate: Decimal,
    pub icms_rate: Decimal,
    pub pis_rate: Decimal,
    pub cofins_rate: Decimal,

    // Costs and expenses
    pub goods_cost: Decimal,
    pub services_cost: Decimal,
    pub operating_expenses: Decimal,
    pub other_expenses: Decimal,
    pub non_deductible_expenses: Decimal,

    // Credits and fiscal adjustments
    pub pis_credits: Decimal,
    pub cofins_credits: Decimal,
    pub fiscal_additions: Decimal,
    pub fiscal_exclusions: Decimal,
    pub accounting_profit: Option<Decimal>,

    // Presumption percentages supplied by the user
    pub presumed_irpj_goods: Decimal,
    pub presumed_csll_goods: Decimal,
    pub presumed_irpj_services: Decimal,
    pub presumed_csll_services: Decimal,

    pub manual_annex: Option<u32>,
    pub goods_apportionment: Vec<ApportionmentLine>,
    pub services_apportionment: Vec<ApportionmentLine>,
}

impl SimulationInput {
    pub fn apportionment(&self, stream: RevenueStream) -> &[ApportionmentLine] {
        match stream {
            RevenueStream::Goods => &self.goods_apportionment,
            RevenueStream::Services => &self.services_apportionment,
        }
    }
}

/// Quantized view of a snapshot shared by all calculators
#[derive(Debug, Clone)]
pub struct Figures {
    pub total_revenue: Decimal,
    pub goods_revenue: Decimal,
    pub services_revenue: Decimal,
    pub export_revenue: Decimal,
    pub trailing_12m_revenue: Decimal,
    pub domestic_revenue: Decimal,
    pub payroll_total: Decimal,
    pub employer_contribution: Decimal,
    pub employer_contribution_rate: Decimal,
    pub alternative_contribution_rate: Decimal,
    pub iss_rate: Decimal,
    pub icms_rate: Decimal,
    pub pis_rate: Decimal,
    pub cofins_rate: Decimal,
    pub goods_cost: Decimal,
    pub services_cost: Decimal,
    pub operating_expenses: Decimal,
    pub other_expenses: Decimal,
    pub non_deductible_expenses: Decimal,
    pub pis_credits: Decimal,
    pub cofins_credits: Decimal,
    pub fiscal_additions: Decimal,
    pub fiscal_exclusions: Decimal,
    pub accounting_profit: Decimal,
    pub presumed_irpj_goods: Decimal,
    pub presumed_csll_goods: Decimal,
    pub presumed_irpj_services: Decimal,
    pub presumed_csll_services: Decimal,
}

impl Figures {
    pub fn from_input(input: &SimulationInput) -> Self {
        let q = round_money;
        let total_revenue = q(input.total_revenue);
        let export_revenue = q(input.export_revenue);

        Self {
            total_revenue,
            goods_revenue: q(input.goods_revenue),
            services_revenue: q(input.services_revenue),
            export_revenue,
            trailing_12m_revenue: q(input.trailing_12m_revenue),
            domestic_revenue: q(total_revenue - export_revenue),
            payroll_total: q(input.payroll_total),
            employer_contribution: q(input.employer_contribution),
            employer_contribution_rate: q(input.employer_contribution_rate),
            alternative_contribution_rate: q(input.alternative_contribution_rate),
            iss_rate: q(input.iss_rate),
            icms_rate: q(input.icms_rate),
            pis_rate: q(input.pis_rate),
            cofins_rate: q(input.cofins_rate),
            goods_cost: q(input.goods_cost),
            services_cost: q(input.services_cost),
            operating_expenses: q(input.operating_expenses),
            other_expenses: q(input.other_expenses),
            non_deductible_expenses: q(input.non_deductible_expenses),
            pis_credits: q(input.pis_credits),
            cofins_credits: q(input.cofins_credits),
            fiscal_additions: q(input.fiscal_additions),
            fiscal_exclusions: q(input.fiscal_exclusions),
            accounting_profit: q(input.accounting_profit.unwrap_or_default()),
            presumed_irpj_goods: q(input.presumed_irpj_goods),
            presumed_csll_goods: q(input.presumed_csll_goods),
            presumed_irpj_services: q(input.presumed_irpj_services),
            presumed_csll_services: q(input.presumed_csll_services),
        }
    }

    pub fn stream_revenue(&self, stream: RevenueStream) -> Decimal {
        match stream {
            RevenueStream::Goods => self.goods_revenue,
            RevenueStream::Services => self.services_revenue,
        }
    }
}
