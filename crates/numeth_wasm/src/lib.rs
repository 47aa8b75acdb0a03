pub mod api;
pub mod requests;

pub use requests::{
    DerivativeRequest, EulerRequest, InterpolationRequest, JacobiRequest, Response, RootRequest,
    Rk2Request, Samples, SimpsonRequest,
};
