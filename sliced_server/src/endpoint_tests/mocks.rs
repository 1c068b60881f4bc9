use mockall::mock;
use sliced_engine::ChargeUpdate;

use crate::{
    data_objects::{NewPixCharge, PixCharge},
    gateway::{GatewayError, PixGateway},
};

mock! {
    pub Gateway {}
    impl PixGateway for Gateway {
        async fn create_charge(&self, request: NewPixCharge) -> Result<PixCharge, GatewayError>;
        async fn fetch_charge(&self, charge_id: &str) -> Result<ChargeUpdate, GatewayError>;
    }
}
