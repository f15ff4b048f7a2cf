use rstest::rstest;
use sewernet_core::{
    ConfigError, ConfigErrorCode, PipeId, SewerNetError, SewerNetErrorCode, SolverError,
    SolverErrorCode, TopologyErrorCode, TopologyViolation,
};

fn pipe(raw: u32) -> PipeId {
    PipeId::new(raw).expect("non-zero id")
}

#[rstest]
#[case(ConfigError::JunctionLimitOutOfRange { got: 9 }, ConfigErrorCode::JunctionLimitOutOfRange)]
#[case(ConfigError::IterationCapOutOfRange { got: 2 }, ConfigErrorCode::IterationCapOutOfRange)]
#[case(ConfigError::MissingOutlet { outlet: pipe(4) }, ConfigErrorCode::MissingOutlet)]
#[case(ConfigError::MissingRainfall, ConfigErrorCode::MissingRainfall)]
#[case(
    ConfigError::MissingAttribute { pipe: pipe(1), attribute: "diameter" },
    ConfigErrorCode::MissingAttribute,
)]
#[case(
    ConfigError::RainZoneOutOfRange { pipe: pipe(1), zone: 3, zones: 1 },
    ConfigErrorCode::RainZoneOutOfRange,
)]
fn returns_expected_config_code(#[case] error: ConfigError, #[case] expected: ConfigErrorCode) {
    assert_eq!(error.code(), expected);
    assert!(error.code().as_str().starts_with("SEWERNET_CONFIG_"));
}

#[rstest]
#[case(TopologyViolation::MissingOutlet, TopologyErrorCode::MissingOutlet)]
#[case(
    TopologyViolation::MultipleOutlets { pipes: vec![pipe(1), pipe(2)] },
    TopologyErrorCode::MultipleOutlets,
)]
#[case(TopologyViolation::SelfLoop { pipe: pipe(5) }, TopologyErrorCode::SelfLoop)]
#[case(TopologyViolation::Cycle { pipe: pipe(2), hops: 3 }, TopologyErrorCode::Cycle)]
#[case(
    TopologyViolation::JunctionOverflow { pipe: pipe(1), upstream: 7, limit: 6 },
    TopologyErrorCode::JunctionOverflow,
)]
fn returns_expected_topology_code(
    #[case] error: TopologyViolation,
    #[case] expected: TopologyErrorCode,
) {
    assert_eq!(error.code(), expected);
}

#[rstest]
#[case(SolverError::NonPositiveDischarge { discharge: 0.0 }, SolverErrorCode::NonPositiveDischarge)]
#[case(SolverError::NonPositiveSlope { slope: -0.1 }, SolverErrorCode::NonPositiveSlope)]
#[case(
    SolverError::DegenerateBracket {
        lower: 0.01,
        upper: 20.0,
        residual_lower: 1.0,
        residual_upper: 2.0,
    },
    SolverErrorCode::DegenerateBracket,
)]
fn returns_expected_solver_code(#[case] error: SolverError, #[case] expected: SolverErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
#[case(
    SewerNetError::from(ConfigError::EmptyNetwork),
    SewerNetErrorCode::Config,
    "SEWERNET_CONFIG_EMPTY_NETWORK",
)]
#[case(
    SewerNetError::from(TopologyViolation::Unresolved { pipe: pipe(8) }),
    SewerNetErrorCode::Topology,
    "SEWERNET_TOPOLOGY_UNRESOLVED",
)]
#[case(
    SewerNetError::Numeric { pipe: pipe(3), error: SolverError::NonPositiveSize { size: 0.0 } },
    SewerNetErrorCode::Numeric,
    "SEWERNET_SOLVER_NON_POSITIVE_SIZE",
)]
fn umbrella_error_exposes_both_codes(
    #[case] error: SewerNetError,
    #[case] expected: SewerNetErrorCode,
    #[case] detail: &str,
) {
    assert_eq!(error.code(), expected);
    assert_eq!(error.detail_code(), detail);
}

#[test]
fn numeric_error_names_the_pipe() {
    let error = SewerNetError::Numeric {
        pipe: pipe(12),
        error: SolverError::NonPositiveSlope { slope: 0.0 },
    };
    let message = error.to_string();
    assert!(message.starts_with("pipe 12:"), "{message}");
    assert!(std::error::Error::source(&error).is_some());
}
