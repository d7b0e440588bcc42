use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 计算请求状态，数值与数据库中的 status_id 一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    New = 1,
    InProgress = 2,
    Success = 3,
    Error = 4,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::New,
        RequestStatus::InProgress,
        RequestStatus::Success,
        RequestStatus::Error,
    ];

    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestStatus::New => "New",
            RequestStatus::InProgress => "InProgress",
            RequestStatus::Success => "Success",
            RequestStatus::Error => "Error",
        }
    }

    /// Success 和 Error 是终态
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Success | RequestStatus::Error)
    }
}

impl TryFrom<i16> for RequestStatus {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, i16> {
        match value {
            1 => Ok(RequestStatus::New),
            2 => Ok(RequestStatus::InProgress),
            3 => Ok(RequestStatus::Success),
            4 => Ok(RequestStatus::Error),
            other => Err(other),
        }
    }
}

/// 计算模型类型（判别值 0 不使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Bezier = 1,
    Dlca = 2,
    Geoids = 3,
    InvRrla = 4,
    Rla = 5,
    Rlca = 6,
    Dla = 7,
    Boltzmann = 8,
    Overlay = 9,
}

impl ModelKind {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Bezier => "Bezier",
            ModelKind::Dlca => "DLCA",
            ModelKind::Geoids => "Geoids",
            ModelKind::InvRrla => "InvRRLA",
            ModelKind::Rla => "RLA",
            ModelKind::Rlca => "RLCA",
            ModelKind::Dla => "DLA",
            ModelKind::Boltzmann => "Boltzmann",
            ModelKind::Overlay => "Overlay",
        }
    }
}

impl TryFrom<i32> for ModelKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, i32> {
        match value {
            1 => Ok(ModelKind::Bezier),
            2 => Ok(ModelKind::Dlca),
            3 => Ok(ModelKind::Geoids),
            4 => Ok(ModelKind::InvRrla),
            5 => Ok(ModelKind::Rla),
            6 => Ok(ModelKind::Rlca),
            7 => Ok(ModelKind::Dla),
            8 => Ok(ModelKind::Boltzmann),
            9 => Ok(ModelKind::Overlay),
            other => Err(other),
        }
    }
}

/// 新建计算请求
#[derive(Debug, Clone)]
pub struct NewCalculationRequest {
    pub model_id: i32,
    pub input_params: serde_json::Value,
    pub user_requester_id: Option<i64>,
}

/// 调度器一次取出的待处理请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: i64,
    pub model_id: i32,
}

/// 计算所需的输入数据
#[derive(Debug, Clone)]
pub struct CalculationInput {
    pub id: i64,
    pub model_id: i32,
    pub input_params: serde_json::Value,
    pub user_requester_id: Option<i64>,
    pub requested_at: DateTime<Utc>,
}

/// 计算结果附带的文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalFile {
    pub file_name_without_extension: String,
    pub extension: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// 计算输出
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOutput {
    pub value: f64,
    pub artifact: Option<PhysicalFile>,
}

impl CalculationOutput {
    pub fn value(value: f64) -> Self {
        Self {
            value,
            artifact: None,
        }
    }
}

/// 存储中的完整计算请求记录
#[derive(Debug, Clone)]
pub struct CalculationRecord {
    pub id: i64,
    pub model_id: i32,
    pub status: RequestStatus,
    pub input_params: serde_json::Value,
    pub user_requester_id: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub output: Option<CalculationOutput>,
}
