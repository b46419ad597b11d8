// Tax module - Brazilian corporate regime simulation (Simples, Presumido, Real)

pub mod comparison;
pub mod input;
pub mod orchestrator;
pub mod payroll;
pub mod presumido;
pub mod rates;
pub mod real;
pub mod reference;
pub mod registry;
pub mod rounding;
pub mod simples;
pub mod sink;
pub mod totals;

pub use comparison::{Comparison, RegimeSummary};
pub use input::{ApportionmentLine, Company, Figures, SimulationInput};
pub use orchestrator::{RegimeOrchestrator, SimulationOutcome};
pub use reference::{ReferenceData, ReferenceTables};
pub use registry::RegimeRegistry;
pub use sink::{MemoryResultSink, ResultSink};
pub use totals::{Notice, RegimeTotals, TOTAL};
