//! # Jacobian storage layouts
//!
//! The Jacobian of an `N`-bin, `n`-species system is an `nN x nN` matrix of `n x n`
//! blocks. Only the diagonal blocks are dense; the nearest neighbour blocks carry
//! entries on their own diagonal only. The assembler writes every entry through
//! [`JacobianIndexing::index`], so each storage format below only has to answer
//! "where does `(block_row, block_col, row, col)` live".
//!
//! Couplings outside this pattern are dropped. That covers the outer neighbours of
//! stencils wider than 3 points, and also the second neighbour reached by the
//! shifted one-sided stencil of the first and last bin at a non-reflective boundary.
//!
//! With `i = block_row*n + row` and `j = block_col*n + col`:
//!
//! | layout                | offset                               | leading dimension |
//! |-----------------------|--------------------------------------|-------------------|
//! | dense row-major       | `i*ld + j`                           | `nN`              |
//! | dense column-major    | `j*ld + i`                           | `nN`              |
//! | banded packed         | `j*ld + n + i - j`                   | `2n + 1`          |
//! | banded padded         | `j*ld + 2n + i - j`                  | `3n + 1`          |
//! | compressed block diag | blocks, then sub- and super-diagonal | `n`               |
//!
//! The banded formats follow the LAPACK band storage with `kl = ku = n`; the padded one
//! reserves `n` extra rows on top for the fill-in of a banded LU factorization.
//! The compressed format stores the `N` diagonal blocks column-major (`n*n` each),
//! then the `N-1` sub-diagonal vectors, then the `N-1` super-diagonal vectors.
use enum_dispatch::enum_dispatch;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait JacobianIndexing {
    /// Storage offset of the entry; only meaningful when [`Self::stores`] is true
    fn index(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> usize;
    /// Whether the layout has room for the entry
    fn stores(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> bool;
    fn storage_len(&self) -> usize;
    fn leading_dimension(&self) -> usize;
    fn kind(&self) -> LayoutKind;
}

/// Layout selector, e.g. read from a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    DenseRowMajor,
    DenseColMajor,
    BandedPacked,
    BandedPadded,
    CompressedBlockDiag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseRowMajor {
    pub nblocks: usize,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseColMajor {
    pub nblocks: usize,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandedPacked {
    pub nblocks: usize,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandedPadded {
    pub nblocks: usize,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedBlockDiag {
    pub nblocks: usize,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[enum_dispatch(JacobianIndexing)]
pub enum JacobianLayout {
    DenseRowMajor(DenseRowMajor),
    DenseColMajor(DenseColMajor),
    BandedPacked(BandedPacked),
    BandedPadded(BandedPadded),
    CompressedBlockDiag(CompressedBlockDiag),
}

pub fn create_layout(kind: LayoutKind, nblocks: usize, n: usize) -> JacobianLayout {
    match kind {
        LayoutKind::DenseRowMajor => JacobianLayout::DenseRowMajor(DenseRowMajor { nblocks, n }),
        LayoutKind::DenseColMajor => JacobianLayout::DenseColMajor(DenseColMajor { nblocks, n }),
        LayoutKind::BandedPacked => JacobianLayout::BandedPacked(BandedPacked { nblocks, n }),
        LayoutKind::BandedPadded => JacobianLayout::BandedPadded(BandedPadded { nblocks, n }),
        LayoutKind::CompressedBlockDiag => {
            JacobianLayout::CompressedBlockDiag(CompressedBlockDiag { nblocks, n })
        }
    }
}

/// Only the diagonal block and the diagonals of the nearest neighbour blocks are ever
/// written by the assembler
#[inline]
fn in_pattern(block_row: usize, block_col: usize, row: usize, col: usize) -> bool {
    block_row == block_col || (block_row.abs_diff(block_col) == 1 && row == col)
}

impl JacobianIndexing for DenseRowMajor {
    fn index(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> usize {
        (block_row * self.n + row) * self.leading_dimension() + block_col * self.n + col
    }
    fn stores(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> bool {
        block_row < self.nblocks && block_col < self.nblocks && row < self.n && col < self.n
    }
    fn storage_len(&self) -> usize {
        self.leading_dimension() * self.leading_dimension()
    }
    fn leading_dimension(&self) -> usize {
        self.n * self.nblocks
    }
    fn kind(&self) -> LayoutKind {
        LayoutKind::DenseRowMajor
    }
}

impl JacobianIndexing for DenseColMajor {
    fn index(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> usize {
        (block_col * self.n + col) * self.leading_dimension() + block_row * self.n + row
    }
    fn stores(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> bool {
        block_row < self.nblocks && block_col < self.nblocks && row < self.n && col < self.n
    }
    fn storage_len(&self) -> usize {
        self.leading_dimension() * self.leading_dimension()
    }
    fn leading_dimension(&self) -> usize {
        self.n * self.nblocks
    }
    fn kind(&self) -> LayoutKind {
        LayoutKind::DenseColMajor
    }
}

/// Band storage with `kl = ku = n` and `offset` extra leading rows
fn band_index(n: usize, ld: usize, offset: usize, i: usize, j: usize) -> usize {
    j * ld + offset + n + i - j
}

fn band_stores(nblocks: usize, n: usize, i: usize, j: usize) -> bool {
    i < n * nblocks && j < n * nblocks && i.abs_diff(j) <= n
}

impl JacobianIndexing for BandedPacked {
    fn index(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> usize {
        let n = self.n;
        band_index(n, self.leading_dimension(), 0, block_row * n + row, block_col * n + col)
    }
    fn stores(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> bool {
        band_stores(self.nblocks, self.n, block_row * self.n + row, block_col * self.n + col)
    }
    fn storage_len(&self) -> usize {
        self.leading_dimension() * self.n * self.nblocks
    }
    fn leading_dimension(&self) -> usize {
        2 * self.n + 1
    }
    fn kind(&self) -> LayoutKind {
        LayoutKind::BandedPacked
    }
}

impl JacobianIndexing for BandedPadded {
    fn index(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> usize {
        let n = self.n;
        band_index(n, self.leading_dimension(), n, block_row * n + row, block_col * n + col)
    }
    fn stores(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> bool {
        band_stores(self.nblocks, self.n, block_row * self.n + row, block_col * self.n + col)
    }
    fn storage_len(&self) -> usize {
        self.leading_dimension() * self.n * self.nblocks
    }
    fn leading_dimension(&self) -> usize {
        3 * self.n + 1
    }
    fn kind(&self) -> LayoutKind {
        LayoutKind::BandedPadded
    }
}

impl CompressedBlockDiag {
    /// first offset of the sub-diagonal vectors
    pub fn sub_offset(&self) -> usize {
        self.nblocks * self.n * self.n
    }

    /// first offset of the super-diagonal vectors
    pub fn sup_offset(&self) -> usize {
        self.sub_offset() + self.nblocks.saturating_sub(1) * self.n
    }
}

impl JacobianIndexing for CompressedBlockDiag {
    fn index(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> usize {
        let n = self.n;
        if block_row == block_col {
            (block_row * n + col) * n + row
        } else if block_col + 1 == block_row {
            self.sub_offset() + block_col * n + row
        } else {
            self.sup_offset() + block_row * n + row
        }
    }
    fn stores(&self, block_row: usize, block_col: usize, row: usize, col: usize) -> bool {
        block_row < self.nblocks
            && block_col < self.nblocks
            && row < self.n
            && col < self.n
            && in_pattern(block_row, block_col, row, col)
    }
    fn storage_len(&self) -> usize {
        self.sup_offset() + self.nblocks.saturating_sub(1) * self.n
    }
    fn leading_dimension(&self) -> usize {
        self.n
    }
    fn kind(&self) -> LayoutKind {
        LayoutKind::CompressedBlockDiag
    }
}

/// Expands the assembled entries of any layout into a dense `nN x nN` matrix.
/// Positions outside the assembled pattern are zero.
pub fn expand_to_dense(layout: &JacobianLayout, data: &[f64], nblocks: usize, n: usize) -> DMatrix<f64> {
    let dim = nblocks * n;
    DMatrix::from_fn(dim, dim, |i, j| {
        let (bri, ri) = (i / n, i % n);
        let (bci, ci) = (j / n, j % n);
        if in_pattern(bri, bci, ri, ci) && layout.stores(bri, bci, ri, ci) {
            data[layout.index(bri, bci, ri, ci)]
        } else {
            0.0
        }
    })
}
