pub mod calculation;

pub use calculation::{
    CalculationInput, CalculationOutput, CalculationRecord, ModelKind, NewCalculationRequest,
    PendingRequest, PhysicalFile, RequestStatus,
};
