/// Map a pre-catalog operation key to its current key. Keys not in the table
/// are returned unchanged. Catalog lookups are case-insensitive, so keys that
/// differ only in case (`ADD` and `add`) need no entry.
pub fn upgraded_operation_name(op: &str) -> &str {
  match op {
    "RESAMPLE" => "resample_to_granularity",
    "SG_SMOOTHER" => "sg",
    "ALMA_SMOOTHER" => "alma",
    "ARMA_SMOOTHER" => "arma",
    "BUTTERWORTH_SMOOTHER" => "butterworth",
    "CHEBYSHEV_SMOOTHER" => "chebyshev",
    "EXP_WMA" => "ewma",
    "LINEAR_WMA" => "lwma",
    "SIMPLE_MA" => "sma",
    "VARIABLE_MA" => "vma",
    "WAVELET_FILTER" => "wavelet_filter",
    "MAX" => "maximum",
    "MIN" => "minimum",
    "ABS" => "abs",
    "POWER" => "power",
    "SQRT" => "sqrt",
    "EXP" => "exp",
    "LOG" => "log",
    "LOGN" => "logn",
    "ROUND" => "round",
    "FLOOR" => "floor",
    "CEIL" => "ceil",
    "DIFFERENTIATE" => "differentiate",
    "INTEGRATE" => "trapezoidal_integration",
    "INTERPOLATE" => "interpolate",
    "CLIP" => "clip",
    "OUTLIER_REMOVAL" => "remove_outliers",
    "PRODUCTIVITY_INDEX" => "productivity_index",
    "REGRESSION" => "poly_regression",
    "DRIFT" => "drift",
    other => other,
  }
}
