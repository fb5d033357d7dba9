//! General mesh-current solver.
//!
//! Used as ground truth for the closed-form corrections: circuits are built
//! branch by branch, each branch listing the loops it belongs to and its
//! orientation in them, and the loop currents come out of an LU solve of
//! the dense loop impedance matrix.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{CorrError, Result};

/// Branch in a mesh: impedance, source EMF and loop incidences (±1)
#[derive(Debug, Clone)]
struct Branch {
    z: Complex64,
    emf: Complex64,
    incidence: Vec<(usize, f64)>,
}

/// Handle of a branch, used to add mutual couplings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchId(usize);

/// Mesh-current formulation of a linear network
#[derive(Debug, Clone)]
pub struct Mesh {
    loops: usize,
    branches: Vec<Branch>,
    couplings: Vec<(usize, usize, Complex64)>,
}

impl Mesh {
    pub fn new(loops: usize) -> Self {
        Self {
            loops,
            branches: Vec::new(),
            couplings: Vec::new(),
        }
    }

    fn push(
        &mut self,
        z: Complex64,
        emf: Complex64,
        incidence: &[(usize, f64)],
    ) -> Result<BranchId> {
        if let Some(&(l, _)) = incidence.iter().find(|(l, _)| *l >= self.loops) {
            return Err(CorrError::Consistency(format!(
                "loop {} does not exist in a {}-loop mesh",
                l, self.loops
            )));
        }
        self.branches.push(Branch {
            z,
            emf,
            incidence: incidence.to_vec(),
        });
        Ok(BranchId(self.branches.len() - 1))
    }

    /// Passive impedance branch
    pub fn impedance(&mut self, z: Complex64, incidence: &[(usize, f64)]) -> Result<BranchId> {
        self.push(z, Complex64::new(0.0, 0.0), incidence)
    }

    /// Passive branch given by its admittance; zero admittance is rejected
    pub fn admittance(&mut self, y: Complex64, incidence: &[(usize, f64)]) -> Result<BranchId> {
        if y.norm() == 0.0 || !y.is_finite() {
            return Err(CorrError::Consistency(format!(
                "admittance {} cannot form a mesh branch",
                y
            )));
        }
        self.push(y.inv(), Complex64::new(0.0, 0.0), incidence)
    }

    /// Voltage source `emf` in series with `z`, driving current along the
    /// branch orientation
    pub fn source(
        &mut self,
        emf: Complex64,
        z: Complex64,
        incidence: &[(usize, f64)],
    ) -> Result<BranchId> {
        self.push(z, emf, incidence)
    }

    /// Mutual impedance between two branches (dot convention: both along
    /// their own orientation)
    pub fn couple(&mut self, a: BranchId, b: BranchId, zm: Complex64) {
        self.couplings.push((a.0, b.0, zm));
    }

    /// Loop impedance matrix and EMF vector
    fn system(&self) -> (DMatrix<Complex64>, DVector<Complex64>) {
        let n = self.loops;
        let mut z = DMatrix::from_element(n, n, Complex64::new(0.0, 0.0));
        let mut e = DVector::from_element(n, Complex64::new(0.0, 0.0));

        for branch in &self.branches {
            for &(l, sl) in &branch.incidence {
                e[l] += branch.emf * sl;
                for &(m, sm) in &branch.incidence {
                    z[(l, m)] += branch.z * (sl * sm);
                }
            }
        }
        for &(a, b, zm) in &self.couplings {
            let (ba, bb) = (&self.branches[a], &self.branches[b]);
            for &(l, sl) in &ba.incidence {
                for &(m, sm) in &bb.incidence {
                    z[(l, m)] += zm * (sl * sm);
                    z[(m, l)] += zm * (sl * sm);
                }
            }
        }
        (z, e)
    }

    /// Loop currents
    pub fn solve(&self) -> Result<Vec<Complex64>> {
        let (z, e) = self.system();
        let scale = z.iter().map(|v| v.norm()).fold(0.0, f64::max);
        if self.loops == 0 || scale == 0.0 || !scale.is_finite() {
            return Err(CorrError::Consistency("mesh matrix is empty or degenerate".into()));
        }
        let currents = z
            .lu()
            .solve(&e)
            .ok_or_else(|| CorrError::Consistency("mesh matrix is singular".into()))?;
        if currents.iter().any(|j| !j.is_finite()) {
            return Err(CorrError::Consistency(
                "mesh solve produced non-finite loop currents".into(),
            ));
        }
        Ok(currents.iter().copied().collect())
    }

    /// Current through a branch along its orientation, given loop currents
    pub fn branch_current(&self, branch: BranchId, loop_currents: &[Complex64]) -> Complex64 {
        self.branches[branch.0]
            .incidence
            .iter()
            .map(|&(l, s)| loop_currents[l] * s)
            .sum()
    }
}

/// Nominal component values of the single-ended circuit at one frequency
#[derive(Debug, Clone, Copy)]
pub struct SingleEndedCircuit {
    pub zo: Complex64,
    pub zca: Complex64,
    pub yca: Complex64,
    pub zcb: Complex64,
    pub ycb: Complex64,
    pub yin: Complex64,
}

/// Nominal component values of the differential circuit at one frequency
#[derive(Debug, Clone, Copy)]
pub struct DifferentialCircuit {
    pub zo: Complex64,
    pub zca: Complex64,
    pub yca: Complex64,
    pub zcal: Complex64,
    pub zcam: Complex64,
    pub zcb: Complex64,
    pub ycb: Complex64,
    pub yin: Complex64,
    pub lo_yin: Complex64,
}

/// Digitizer voltage produced by Thevenin voltage `v_th`
///
/// Loops: source and terminal shunt; terminal and cable shunts; cable shunt
/// and digitizer.
pub fn single_ended_output(v_th: Complex64, c: &SingleEndedCircuit) -> Result<Complex64> {
    let mut mesh = Mesh::new(3);
    mesh.source(v_th, c.zo, &[(0, 1.0)])?;
    mesh.impedance(c.zca * 0.5, &[(0, 1.0)])?;
    mesh.admittance(c.yca, &[(0, 1.0), (1, -1.0)])?;
    mesh.impedance(c.zca * 0.5, &[(1, 1.0)])?;
    mesh.impedance(c.zcb * 0.5, &[(1, 1.0)])?;
    mesh.admittance(c.ycb, &[(1, 1.0), (2, -1.0)])?;
    mesh.impedance(c.zcb * 0.5, &[(2, 1.0)])?;
    mesh.admittance(c.yin, &[(2, 1.0)])?;
    let j = mesh.solve()?;
    Ok(j[2] / c.yin)
}

/// High- and low-side digitizer voltages produced by a floating Thevenin
/// voltage `v_th`
///
/// Loops: source and terminal shunt; return through both cable shunts;
/// high-side cable end and digitizer; low-side cable end and digitizer.
pub fn differential_outputs(
    v_th: Complex64,
    c: &DifferentialCircuit,
) -> Result<(Complex64, Complex64)> {
    let mut mesh = Mesh::new(4);
    mesh.source(v_th, c.zo, &[(0, 1.0)])?;
    let za1 = mesh.impedance(c.zca * 0.5, &[(0, 1.0)])?;
    let zl1 = mesh.impedance(c.zcal * 0.5, &[(0, -1.0)])?;
    mesh.admittance(c.yca, &[(0, 1.0), (1, -1.0)])?;

    let za2 = mesh.impedance(c.zca * 0.5, &[(1, 1.0)])?;
    let zl2 = mesh.impedance(c.zcal * 0.5, &[(1, -1.0)])?;
    mesh.impedance(c.zcb * 0.5, &[(1, 1.0)])?;
    mesh.impedance(c.zcb * 0.5, &[(1, -1.0)])?;
    mesh.admittance(c.ycb, &[(1, 1.0), (2, -1.0)])?;
    mesh.admittance(c.ycb, &[(1, -1.0), (3, -1.0)])?;

    mesh.impedance(c.zcb * 0.5, &[(2, 1.0)])?;
    mesh.admittance(c.yin, &[(2, 1.0)])?;
    mesh.impedance(c.zcb * 0.5, &[(3, 1.0)])?;
    mesh.admittance(c.lo_yin, &[(3, 1.0)])?;

    mesh.couple(za1, zl1, c.zcam * 0.5);
    mesh.couple(za2, zl2, c.zcam * 0.5);

    let j = mesh.solve()?;
    Ok((j[2] / c.yin, j[3] / c.lo_yin))
}

/// Voltage across the open terminals of a transducer (the quantity its
/// transfer is calibrated against)
pub fn open_terminal_voltage(
    v_th: Complex64,
    zo: Complex64,
    z_series: Complex64,
    yca: Complex64,
) -> Result<Complex64> {
    let mut mesh = Mesh::new(1);
    mesh.source(v_th, zo, &[(0, 1.0)])?;
    mesh.impedance(z_series * 0.5, &[(0, 1.0)])?;
    mesh.admittance(yca, &[(0, 1.0)])?;
    let j = mesh.solve()?;
    Ok(j[0] / yca)
}
