/// Reference (naive) GEMM kernels
///
/// Bit-exact with the tiled engine; used only to validate it.
use mxint_core::dims::{check_accumulator_bound, GROUP_SIZE};
use mxint_core::error::{Error, Result};
use mxint_core::quant::dequantize_at;

/// Naive matrix multiplication over packed weights: C = A * dequant(W)
///
/// A: [M, K] int8
/// W: [K, N] MXINT4, `ceil(K*N/2)` packed bytes + `K*N/GROUP_SIZE` scales
/// C: [M, N] int32
///
/// Each weight is dequantized on the fly, once per use.
pub fn reference_matmul(
    a: &[i8],
    w_packed: &[u8],
    scales: &[u8],
    m: usize,
    k: usize,
    n: usize,
) -> Result<Vec<i32>> {
    check_accumulator_bound(k)?;
    if a.len() != m * k {
        return Err(Error::InvalidShape(format!(
            "Matrix A size mismatch: expected {}, got {}",
            m * k,
            a.len()
        )));
    }
    if w_packed.len() != (k * n).div_ceil(2) {
        return Err(Error::InvalidShape(format!(
            "Packed W size mismatch: expected {}, got {}",
            (k * n).div_ceil(2),
            w_packed.len()
        )));
    }
    if scales.len() != (k * n).div_ceil(GROUP_SIZE) {
        return Err(Error::InvalidShape(format!(
            "Scale table size mismatch: expected {}, got {}",
            (k * n).div_ceil(GROUP_SIZE),
            scales.len()
        )));
    }

    let mut c = vec![0i32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0i32;
            for l in 0..k {
                let w = dequantize_at(w_packed, scales, l * n + j);
                sum += a[i * k + l] as i32 * w as i32;
            }
            c[i * n + j] = sum;
        }
    }

    Ok(c)
}

/// Naive matrix multiplication over an already dequantized W
///
/// A: [M, K] int8
/// W: [K, N] int8
/// C: [M, N] int32
pub fn reference_matmul_dequantized(
    a: &[i8],
    w: &[i8],
    m: usize,
    k: usize,
    n: usize,
) -> Result<Vec<i32>> {
    check_accumulator_bound(k)?;
    if a.len() != m * k {
        return Err(Error::InvalidShape(format!(
            "Matrix A size mismatch: expected {}, got {}",
            m * k,
            a.len()
        )));
    }
    if w.len() != k * n {
        return Err(Error::InvalidShape(format!(
            "Matrix W size mismatch: expected {}, got {}",
            k * n,
            w.len()
        )));
    }

    let mut c = vec![0i32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0i32;
            for l in 0..k {
                sum += a[i * k + l] as i32 * w[l * n + j] as i32;
            }
            c[i * n + j] = sum;
        }
    }

    Ok(c)
}
