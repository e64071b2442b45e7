use serde::{Deserialize, Serialize};

use crate::inner::conf::cmd_args::AppConf;
use crate::inner::conf::dto::peripheral::PeripheralSelectorDto;
use crate::inner::conf::dto::request::RequestDto;
use crate::inner::error::QueueError;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) struct RequestPlanDto {
    #[serde(default)]
    pub(crate) peripheral: PeripheralSelectorDto,
    pub(crate) requests: Vec<RequestDto>,
}

impl TryFrom<&AppConf> for RequestPlanDto {
    type Error = QueueError;

    fn try_from(value: &AppConf) -> Result<Self, Self::Error> {
        let plan = std::fs::read_to_string(&value.plan)?;
        let plan: RequestPlanDto = serde_yaml::from_str(&plan)?;
        Ok(plan)
    }
}
