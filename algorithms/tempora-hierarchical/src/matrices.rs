//! Summation and reconciliation matrices
//!
//! Both matrices are labelled with the nodes of the hierarchy. The summation matrix `S` maps
//! the bottom nodes onto every node, a reconciliation matrix `G` maps the base forecasts of
//! every node onto the bottom nodes, so `G.rows == S.columns` and `G.columns == S.rows`.

use linfa_linalg::cholesky::Cholesky;
use linfa_linalg::triangular::{SolveTriangularInplace, UPLO};
use ndarray::{Array1, Array2, Axis};
use tempora::dataset::IndexKey;
use tempora::Float;
use tracing::debug;

use crate::error::{HierarchicalError, Result};
use crate::{covers, is_aggregate, Node};

/// Dense matrix with a node label for every row and column
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix<F> {
    rows: Vec<Node>,
    columns: Vec<Node>,
    values: Array2<F>,
}

impl<F: Float> LabeledMatrix<F> {
    pub fn new(rows: Vec<Node>, columns: Vec<Node>, values: Array2<F>) -> Result<Self> {
        if values.dim() != (rows.len(), columns.len()) {
            return Err(HierarchicalError::Misaligned(format!(
                "matrix of shape {:?} for {} row and {} column labels",
                values.dim(),
                rows.len(),
                columns.len()
            )));
        }
        Ok(LabeledMatrix {
            rows,
            columns,
            values,
        })
    }

    pub fn rows(&self) -> &[Node] {
        &self.rows
    }

    pub fn columns(&self) -> &[Node] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<F> {
        &self.values
    }

    /// Entry at the given row and column labels
    pub fn get(&self, row: &[IndexKey], column: &[IndexKey]) -> Option<F> {
        let i = self.rows.iter().position(|r| r.as_slice() == row)?;
        let j = self.columns.iter().position(|c| c.as_slice() == column)?;
        Some(self.values[(i, j)])
    }
}

/// Summation matrix of a set of nodes
///
/// Rows follow `nodes`, columns are the bottom nodes (those without aggregate keys) in the
/// same order. Entry `(i, j)` is one if node `i` contains bottom node `j`.
pub fn summation_matrix<F: Float>(nodes: &[Node]) -> Result<LabeledMatrix<F>> {
    let bottom: Vec<Node> = nodes.iter().filter(|n| !is_aggregate(n)).cloned().collect();
    if bottom.is_empty() {
        return Err(HierarchicalError::InvalidHierarchy(
            "no bottom level nodes".into(),
        ));
    }
    let values = Array2::from_shape_fn((nodes.len(), bottom.len()), |(i, j)| {
        if covers(&nodes[i], &bottom[j]) {
            F::one()
        } else {
            F::zero()
        }
    });
    debug!(
        n_nodes = nodes.len(),
        n_bottom = bottom.len(),
        "built summation matrix"
    );

    LabeledMatrix::new(nodes.to_vec(), bottom, values)
}

/// Covariance of the base forecast errors assumed by a reconciliation
#[derive(Debug, Clone)]
pub(crate) enum ErrorWeights<F> {
    Identity,
    Diagonal(Array1<F>),
    Full(Array2<F>),
}

/// Bottom up reconciliation, every bottom node keeps its own base forecast
pub(crate) fn bottom_up<F: Float>(s: &LabeledMatrix<F>) -> Result<LabeledMatrix<F>> {
    let values = Array2::from_shape_fn((s.columns.len(), s.rows.len()), |(j, i)| {
        if s.columns[j] == s.rows[i] {
            F::one()
        } else {
            F::zero()
        }
    });

    LabeledMatrix::new(s.columns.clone(), s.rows.clone(), values)
}

/// Top down reconciliation, the total is split by fixed proportions
pub(crate) fn top_down<F: Float>(
    s: &LabeledMatrix<F>,
    proportions: &Array1<F>,
) -> Result<LabeledMatrix<F>> {
    let total = s
        .rows
        .iter()
        .position(|n| n.iter().all(|k| k.as_str() == Some(crate::TOTAL)))
        .ok_or_else(|| {
            HierarchicalError::InvalidHierarchy("top down needs the total node".into())
        })?;
    let mut values = Array2::zeros((s.columns.len(), s.rows.len()));
    values.column_mut(total).assign(proportions);

    LabeledMatrix::new(s.columns.clone(), s.rows.clone(), values)
}

/// Generalized least squares reconciliation `G = (Sᵀ W⁻¹ S)⁻¹ Sᵀ W⁻¹`
pub(crate) fn least_squares<F: Float>(
    s: &LabeledMatrix<F>,
    weights: &ErrorWeights<F>,
) -> Result<LabeledMatrix<F>> {
    let w_inv_s = match weights {
        ErrorWeights::Identity => s.values.clone(),
        ErrorWeights::Diagonal(w) => {
            if let Some(v) = w.iter().find(|v| !(**v > F::zero())) {
                return Err(HierarchicalError::InvalidHierarchy(format!(
                    "error variances must be positive, got {}",
                    v
                )));
            }
            &s.values / &w.view().insert_axis(Axis(1))
        }
        ErrorWeights::Full(w) => solve_spd(w, s.values.clone())?,
    };
    let normal = s.values.t().dot(&w_inv_s);
    let g = solve_spd(&normal, w_inv_s.reversed_axes())?;

    LabeledMatrix::new(s.columns.clone(), s.rows.clone(), g)
}

/// Solve `A X = B` for a symmetric positive definite `A`
fn solve_spd<F: Float>(a: &Array2<F>, b: Array2<F>) -> Result<Array2<F>> {
    let lower = a.cholesky()?;
    let mut x = b;
    lower.solve_triangular_inplace(&mut x, UPLO::Lower)?;
    lower.t().solve_triangular_inplace(&mut x, UPLO::Upper)?;
    Ok(x)
}

/// Add a small multiple of the mean variance to the diagonal
///
/// Residuals of linear base forecasters are coherent themselves, which makes their sample
/// covariance singular.
pub(crate) fn regularized<F: Float>(mut w: Array2<F>) -> Array2<F> {
    let n = w.nrows().max(1);
    let mean = w.diag().sum() / F::cast(n);
    let scale = if mean.is_finite() && mean > F::zero() {
        mean
    } else {
        F::one()
    };
    let ridge = F::cast(1e-9) * scale;
    w.diag_mut().mapv_inplace(|v| v + ridge);
    w
}

/// Uncentered sample covariance of the residual rows
pub(crate) fn residual_covariance<F: Float>(residuals: &Array2<F>) -> Array2<F> {
    let n = F::cast(residuals.nrows().max(1));
    residuals.t().dot(residuals) / n
}

/// Schäfer-Strimmer shrinkage of the residual covariance towards its diagonal
///
/// Returns the shrunk covariance and the shrinkage intensity in `[0, 1]`.
pub(crate) fn shrunk_covariance<F: Float>(residuals: &Array2<F>) -> (Array2<F>, F) {
    let (t, n) = residuals.dim();
    let tf = F::cast(t.max(2));
    let cov = residual_covariance(residuals);
    let sd = cov.diag().mapv(|v| v.sqrt());
    let scaled = Array2::from_shape_fn((t, n), |(i, j)| {
        if sd[j] > F::zero() {
            residuals[(i, j)] / sd[j]
        } else {
            F::zero()
        }
    });

    let cross = scaled.t().dot(&scaled);
    let squared = scaled.mapv(|v| v * v);
    let cross_squared = squared.t().dot(&squared);

    let (mut var_sum, mut corr_sum) = (F::zero(), F::zero());
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let c = cross[(i, j)];
            var_sum += (cross_squared[(i, j)] - c * c / tf) / (tf * (tf - F::one()));
            corr_sum += (c / tf) * (c / tf);
        }
    }
    let lambda = if corr_sum > F::zero() {
        (var_sum / corr_sum).max(F::zero()).min(F::one())
    } else {
        F::one()
    };

    let mut shrunk = cov.mapv(|v| v * (F::one() - lambda));
    for i in 0..n {
        shrunk[(i, i)] = cov[(i, i)];
    }
    (shrunk, lambda)
}
