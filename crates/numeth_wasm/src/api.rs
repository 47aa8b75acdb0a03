//! `#[wasm_bindgen]` entry points, one per method.
//!
//! Each takes the serialized request object and returns the serialized
//! [`Response`]. A JS error is raised only when the request itself cannot be
//! decoded or the response cannot be encoded.

use crate::requests::{
    DerivativeRequest, EulerRequest, InterpolationRequest, JacobiRequest, Response, RootRequest,
    Rk2Request, SimpsonRequest,
};
use anyhow::{anyhow, Context};
use js_sys::Float64Array;
use numeth_core::ode::SystemTrajectory;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

fn decode<T: DeserializeOwned + Default>(request: JsValue, method: &str) -> anyhow::Result<T> {
    if request.is_undefined() || request.is_null() {
        return Ok(T::default());
    }
    from_value(request)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {method} request"))
}

fn encode<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

fn run<Q, T, R, V>(
    request: JsValue,
    method: &str,
    solve: impl FnOnce(&Q) -> Response<T, R, V>,
) -> Result<JsValue, JsValue>
where
    Q: DeserializeOwned + Default,
    Response<T, R, V>: Serialize,
{
    console_error_panic_hook::set_once();
    let request: Q = decode(request, method).map_err(js_error)?;
    encode(&solve(&request))
}

#[wasm_bindgen]
pub fn fixed_point(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "fixed point", RootRequest::run)
}

#[wasm_bindgen]
pub fn jacobi(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "Jacobi", JacobiRequest::run)
}

#[wasm_bindgen]
pub fn lagrange(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "interpolation", InterpolationRequest::run)
}

#[wasm_bindgen]
pub fn simpson38(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "Simpson 3/8", SimpsonRequest::run)
}

#[wasm_bindgen]
pub fn second_derivative(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "second derivative", DerivativeRequest::run)
}

#[wasm_bindgen]
pub fn rk2(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "RK2", Rk2Request::run)
}

#[wasm_bindgen]
pub fn euler_system(request: JsValue) -> Result<JsValue, JsValue> {
    run(request, "Euler system", EulerRequest::run)
}

fn euler_trajectory(request: JsValue) -> Result<SystemTrajectory, JsValue> {
    console_error_panic_hook::set_once();
    let request: EulerRequest = decode(request, "Euler system").map_err(js_error)?;
    request
        .solve()
        .map_err(|e| JsValue::from_str(&format!("Euler integration failed: {}", e)))
}

/// Time series of one component of an Euler trajectory, for plotting.
#[wasm_bindgen]
pub fn euler_series(request: JsValue, component: u32) -> Result<Float64Array, JsValue> {
    let trajectory = euler_trajectory(request)?;
    let series = usize::try_from(component)
        .ok()
        .and_then(|j| trajectory.component(j))
        .ok_or_else(|| JsValue::from_str("Component index out of range."))?;
    Ok(Float64Array::from(series.as_slice()))
}

/// Time axis of an Euler trajectory, matching [`euler_series`] sample for sample.
#[wasm_bindgen]
pub fn euler_times(request: JsValue) -> Result<Float64Array, JsValue> {
    let trajectory = euler_trajectory(request)?;
    Ok(Float64Array::from(trajectory.t.as_slice()))
}

/// The request the front end pre-fills for `method`.
#[wasm_bindgen]
pub fn default_request(method: &str) -> Result<JsValue, JsValue> {
    match method {
        "fixed_point" => encode(&RootRequest::default()),
        "jacobi" => encode(&JacobiRequest::default()),
        "lagrange" => encode(&InterpolationRequest::default()),
        "simpson38" => encode(&SimpsonRequest::default()),
        "second_derivative" => encode(&DerivativeRequest::default()),
        "rk2" => encode(&Rk2Request::default()),
        "euler_system" => encode(&EulerRequest::default()),
        _ => Err(JsValue::from_str("Unknown method")),
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_value_tests {
    use super::*;
    use js_sys::Reflect;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn status(response: &JsValue) -> Option<String> {
        Reflect::get(response, &JsValue::from_str("status"))
            .ok()
            .and_then(|value| value.as_string())
    }

    #[wasm_bindgen_test]
    fn missing_request_runs_the_default_problem() {
        let response = fixed_point(JsValue::UNDEFINED).expect("response");
        assert_eq!(status(&response).as_deref(), Some("ok"));
    }

    #[wasm_bindgen_test]
    fn default_requests_round_trip_through_js() {
        for method in ["jacobi", "lagrange", "simpson38", "second_derivative", "rk2"] {
            let request = default_request(method).expect("default request");
            let response = match method {
                "jacobi" => jacobi(request),
                "lagrange" => lagrange(request),
                "simpson38" => simpson38(request),
                "second_derivative" => second_derivative(request),
                _ => rk2(request),
            }
            .expect("response");
            assert_eq!(status(&response).as_deref(), Some("ok"), "{method}");
        }
    }

    #[wasm_bindgen_test]
    fn method_failures_are_values_not_errors() {
        let request = to_value(&JacobiRequest {
            rhs: vec![1.0],
            ..JacobiRequest::default()
        })
        .expect("encode");
        let response = jacobi(request).expect("response");
        assert_eq!(status(&response).as_deref(), Some("failed"));
    }

    #[wasm_bindgen_test]
    fn undecodable_request_is_a_js_error() {
        let err = rk2(JsValue::from_str("not an object")).expect_err("decode error");
        let message = err.as_string().unwrap_or_default();
        assert!(message.contains("Invalid RK2 request"));
    }

    #[wasm_bindgen_test]
    fn euler_series_and_times_line_up() {
        let request = || default_request("euler_system").expect("default request");
        let y0 = euler_series(request(), 0).expect("component 0");
        assert_eq!(y0.length(), 1001);
        assert_eq!(y0.get_index(0), 1.0);
        let t = euler_times(request()).expect("time axis");
        assert_eq!(t.length(), y0.length());
        assert_eq!(t.get_index(0), 0.0);
        assert!(euler_series(request(), 2).is_err());
    }
}
