use crate::ReactionDiffusion::engine::ReactionDiffusion;
use crate::ReactionDiffusion::jacobian_layout::{LayoutKind, expand_to_dense};
use crate::ReactionDiffusion::problem::{Geometry, ProblemDefinition, RDError};
use crate::Utils::transforms::linspace_edges;
use log::info;
use prettytable::{Cell, Row, Table};

fn profile_table(rd: &ReactionDiffusion, columns: &[(&str, &[f64])]) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("x")];
    header.extend(columns.iter().map(|(name, _)| Cell::new(name)));
    table.add_row(Row::new(header));
    for (bi, x) in rd.xcenters().iter().enumerate() {
        let mut row = vec![Cell::new(&format!("{:.4}", x))];
        row.extend(
            columns
                .iter()
                .map(|(_, values)| Cell::new(&format!("{:.6e}", values[bi]))),
        );
        table.add_row(Row::new(row));
    }
    table
}

pub fn rd_examples(task: usize) -> Result<(), RDError> {
    match task {
        0 => {
            // SINGLE BIN KINETICS: A + B -> C, C -> A + B with the reverse rate depending on C and D
            let mut problem = ProblemDefinition::new(
                4,
                1,
                vec![vec![0, 1], vec![2]],
                vec![vec![2], vec![0, 1]],
                vec![1.0, 0.5],
            );
            problem.stoich_actv = vec![vec![], vec![2, 3]];
            let mut rd = ReactionDiffusion::new(&problem)?;
            let names: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
            rd.network.pretty_print(Some(&names));
            let y = [1.3, 1e-4, 0.7, 1e-4];
            let mut dydt = vec![0.0; 4];
            rd.f(0.0, &y, &mut dydt);
            for (name, v) in names.iter().zip(dydt.iter()) {
                println!("d[{}]/dt = {:e}", name, v);
            }
            let contrib = rd.per_rxn_contrib_to_fi(0.0, &y, 2);
            println!("contributions to d[C]/dt per reaction: {:?}", contrib);
        }
        1 => {
            // CLOSED DIFFUSION: linearly implicit Euler steps with the block preconditioner
            // as the linear solver
            let nbins = 30;
            let mut problem = ProblemDefinition::new(1, nbins, vec![], vec![], vec![]);
            problem.D = vec![1e-2];
            problem.mobility = vec![0.0];
            problem.z_chg = vec![0];
            problem.x = linspace_edges(0.0, 1.0, nbins, false)?;
            let mut rd = ReactionDiffusion::new(&problem)?;
            let mut y: Vec<f64> = rd
                .xcenters()
                .iter()
                .map(|x| (-((x - 0.3) / 0.05).powi(2)).exp() + 1e-3)
                .collect();
            let mass0: f64 = y.iter().sum();
            let h = 0.05;
            let mut fy = vec![0.0; nbins];
            let mut dy = vec![0.0; nbins];
            for step in 0..40 {
                let t = step as f64 * h;
                rd.f(t, &y, &mut fy);
                let rhs: Vec<f64> = fy.iter().map(|v| h * v).collect();
                rd.prec_setup(t, &y, Some(&fy), true);
                rd.prec_solve_left(t, &y, Some(&fy), &rhs, &mut dy, h)?;
                y.iter_mut().zip(dy.iter()).for_each(|(yi, di)| *yi += di);
            }
            let mass: f64 = y.iter().sum();
            info!("relative mass drift after 40 steps: {:e}", (mass - mass0) / mass0);
            profile_table(&rd, &[("C", &y[..])]).printstd();
            println!("{:?}", rd.counters);
        }
        2 => {
            // SELF-CONSISTENT FIELD: excess of positive charge in the middle of a flat slab
            let nbins = 12;
            let mut problem = ProblemDefinition::new(2, nbins, vec![], vec![], vec![]);
            problem.D = vec![1e-9, 1e-9];
            problem.mobility = vec![4e-8, 4e-8];
            problem.z_chg = vec![1, -1];
            problem.x = linspace_edges(0.0, 1e-6, nbins, false)?;
            problem.auto_efield = true;
            problem.eps_rel = 80.1;
            problem.geom = Geometry::Flat;
            let mut rd = ReactionDiffusion::new(&problem)?;
            let y: Vec<f64> = (0..nbins)
                .flat_map(|bi| {
                    let excess = if (4..8).contains(&bi) { 1e-6 } else { 0.0 };
                    [1e-3 + excess, 1e-3]
                })
                .collect();
            let mut dydt = vec![0.0; 2 * nbins];
            rd.f(0.0, &y, &mut dydt);
            let cation_rate: Vec<f64> = dydt.iter().step_by(2).copied().collect();
            let netchg = rd.netchg().to_vec();
            let efield = rd.efield().to_vec();
            profile_table(
                &rd,
                &[
                    ("net charge", &netchg[..]),
                    ("E", &efield[..]),
                    ("d[+]/dt", &cation_rate[..]),
                ],
            )
            .printstd();
        }
        3 => {
            // JSON CONFIGURATION AND JACOBIAN LAYOUTS
            let json = r#"{
                "n": 2, "N": 5,
                "stoich_reac": [[0], [1]], "stoich_prod": [[1], [0]], "k": [2.0, 0.5],
                "D": [0.1, 0.2], "mobility": [0.0, 0.0], "z_chg": [0, 0],
                "x": [1.0, 1.2, 1.4, 1.6, 1.8, 2.0],
                "geom": "cylindrical", "logy": true
            }"#;
            let problem = ProblemDefinition::from_json_str(json)?;
            let mut rd = ReactionDiffusion::new(&problem)?;
            let y: Vec<f64> = (0..10).map(|i| (0.2 + 0.05 * i as f64).ln()).collect();
            for kind in [LayoutKind::BandedPacked, LayoutKind::CompressedBlockDiag] {
                let ja = rd.jacobian(0.0, &y, None, kind);
                let dense = expand_to_dense(&rd.layout(kind), &ja, rd.N, rd.n);
                println!("{:?} ({} stored values): {:.4}", kind, ja.len(), dense);
            }
        }
        _ => {
            println!("no such example: {}", task);
        }
    }
    Ok(())
}
