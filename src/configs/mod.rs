mod a2c;
mod ac;
mod ddqn;
mod dpg;
mod ma_dpg;
mod ma_td3;
mod td3;
mod train;

pub use a2c::A2C_Config;
pub use ac::AC_Config;
pub use ddqn::DDQN_Config;
pub use dpg::DPG_Config;
pub use ma_dpg::MADPG_Config;
pub use ma_td3::MATD3_Config;
pub use td3::TD3_Config;
pub use train::TrainConfig;
