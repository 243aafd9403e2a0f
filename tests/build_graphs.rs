use burn::{backend::NdArray, tensor::Tensor};
use unet_burn::{
    layers::ConvPadding, output_side_length, Activation, Controls, EfficientUnetConfig,
    ElementKind, GeometryError, StageLocation, UnetConfig, UnetError,
};

#[test]
fn standard_ground_truth_follows_the_shape_calculator() {
    let device = Default::default();

    for (side_length, depth) in [(44, 2), (92, 3), (60, 1)] {
        let config = UnetConfig::new()
            .with_in_channels(1)
            .with_start_filters(2)
            .with_side_length(side_length)
            .with_depth(depth);
        let graph = config.build::<NdArray>(&device).unwrap();

        let expected = output_side_length(side_length, depth + 1, 2, 3, 2).unwrap();
        assert_eq!(graph.ground_truth.shape, vec![1, expected, expected]);
        assert_eq!(graph.ground_truth.kind, ElementKind::Int);

        let logits = graph
            .logits(
                Tensor::ones([1, side_length, side_length, 1], &device),
                &Controls::inference(),
            )
            .unwrap();
        assert_eq!(logits.dims(), [1, expected, expected, 2]);
    }
}

#[test]
fn builders_are_independent() {
    let device = Default::default();
    let config = UnetConfig::new()
        .with_start_filters(2)
        .with_side_length(44)
        .with_depth(2);

    let first = config.build::<NdArray>(&device).unwrap();
    let second = config.build::<NdArray>(&device).unwrap();

    assert_eq!(first.inputs, second.inputs);
    assert_eq!(first.topology, second.topology);
}

#[test]
fn explicit_namespaces_prefix_every_name() {
    let device = Default::default();
    let graph = EfficientUnetConfig::new()
        .with_start_filters(2)
        .with_side_length(8)
        .with_depth(1)
        .build_in::<NdArray>(unet_burn::scope::Scope::root("left"), &device)
        .unwrap();

    assert_eq!(graph.inputs.name, "left/inputs/inputs");
    assert_eq!(graph.keep_prob.name, "left/inputs/keep_prob");
    assert_eq!(graph.topology.contracting, vec!["left/contracting/step_0"]);
    assert_eq!(graph.topology.bottom, "left/step_1");
    assert_eq!(graph.topology.expanding, vec!["left/expanding/step_2"]);
}

#[test]
fn invalid_activation_fails_before_any_graph_exists() {
    let err = EfficientUnetConfig::new()
        .with_activation_name("sigmoid")
        .unwrap_err();
    assert!(matches!(err, UnetError::InvalidActivation { .. }));

    let json = r#"{
        "in_channels": 1, "out_channels": 2, "start_filters": 4, "side_length": 16,
        "depth": 2, "res_blocks": 1, "filter_size": 3, "sparse_labels": true,
        "batch_size": 1, "activation": "sigmoid", "batch_norm": true
    }"#;
    assert!(serde_json::from_str::<EfficientUnetConfig>(json).is_err());

    let parsed: EfficientUnetConfig =
        serde_json::from_str(&json.replace("sigmoid", "CRELU")).unwrap();
    assert_eq!(parsed.activation, Activation::CRelu);
}

#[test]
fn configs_round_trip_through_json() {
    let config = UnetConfig::new()
        .with_padding(ConvPadding::Same)
        .with_sparse_labels(false);

    let json = serde_json::to_string(&config).unwrap();
    let restored: UnetConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.padding, ConvPadding::Same);
    assert!(!restored.sparse_labels);
    assert_eq!(restored.side_length, 572);
    assert!(config.to_string().contains("\"depth\""));
}

#[test]
fn geometry_errors_name_the_offending_stage() {
    let err = UnetConfig::new()
        .with_side_length(13)
        .with_depth(2)
        .with_filter_size(2)
        .build::<NdArray>(&Default::default())
        .unwrap_err();

    assert_eq!(
        err,
        UnetError::Geometry(GeometryError::NotDivisible {
            stage: 0,
            side_length: 11,
            pool_size: 2,
        })
    );

    let err = output_side_length(10, 4, 2, 3, 2).unwrap_err();
    assert!(matches!(
        err,
        GeometryError::TooSmall {
            location: StageLocation::Contracting(1),
            ..
        }
    ));
}
