use std::rc::Rc;

use aero_shadergen::ffp::{FfpColour, FfpTexturing, FfpTransform};
use aero_shadergen::{
    AutoConstantType, CompactPolicy, Error, GeneratedShaders, GenerationContext, ProgramSet,
    RenderStateRegistry, ShaderGenOptions, TargetRenderState,
};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn textured_pass() -> TargetRenderState {
    let registry = RenderStateRegistry::with_ffp_factories();
    let mut target = TargetRenderState::new();
    for state in ["FFP_Texturing", "FFP_Colour", "FFP_Transform"] {
        target.add_by_name(&registry, state).unwrap();
    }
    target
}

fn generate(language: &str) -> GeneratedShaders {
    init_tracing();
    let options = ShaderGenOptions::default().with_target_language(language);
    let mut context = GenerationContext::with_bundled_libraries(options);
    context.generate_render_state(&mut textured_pass()).unwrap()
}

#[test]
fn textured_pass_in_glsles() {
    let shaders = generate("glsles");
    assert_eq!(shaders.language, "glsles");

    let vs = &shaders.vertex_source;
    assert!(vs.starts_with("#version 100\nprecision mediump float;\n"), "{vs}");
    assert!(vs.contains("uniform\tmat4\tworldviewproj_matrix;\n"), "{vs}");
    for line in [
        "attribute vec4 vertex;\n",
        "attribute vec4 colour;\n",
        "attribute vec2 uv0;\n",
        "varying vec4 oColor_0;\n",
        "varying vec2 oTexcoord_0;\n",
        "\tFFP_Transform(worldviewproj_matrix, vertex, gl_Position);\n",
        "\toColor_0 = colour;\n",
        "\toTexcoord_0 = uv0;\n",
    ] {
        assert!(vs.contains(line), "missing {line:?} in\n{vs}");
    }
    assert!(!vs.contains("#include"), "{vs}");
    assert!(
        vs.contains("void FFP_Transform(in mat4 m, in vec4 v, out vec4 vOut)\n{"),
        "{vs}"
    );
    assert!(!vs.contains("FFP_TransformNormal"), "{vs}");

    let fs = &shaders.fragment_source;
    for line in [
        "uniform\tsampler2D\tgTextureSampler0;\n",
        "varying vec4 oColor_0;\n",
        "varying vec2 oTexcoord_0;\n",
        "\tvec4\ttexel_0;\n",
    ] {
        assert!(fs.contains(line), "missing {line:?} in\n{fs}");
    }
    let body = &fs[fs.find("void main()").unwrap()..];
    assert_eq!(
        body,
        "\
void main()
{
\tvec4\ttexel_0;

\tgl_FragColor = oColor_0;
\ttexel_0 = texture2D(gTextureSampler0, oTexcoord_0);
\tFFP_Modulate(texel_0, gl_FragColor, gl_FragColor);
}

"
    );

    let saturate = fs.find("vec4 FFP_Saturate(in vec4 v);").unwrap();
    let modulate = fs
        .find("void FFP_Modulate(in vec4 vIn0, in vec4 vIn1, out vec4 vOut);")
        .unwrap();
    assert!(saturate < modulate, "{fs}");
    assert!(fs.contains("#define FFP_COLOUR_MAX 1.0\n"), "{fs}");
    assert!(!fs.contains("FFP_ModulateX2"), "{fs}");
}

#[test]
fn textured_pass_in_hlsl() {
    let shaders = generate("hlsl");

    let vs = &shaders.vertex_source;
    assert!(vs.contains("#include \"FFPLib_Transform.hlsl\"\n"), "{vs}");
    assert!(vs.contains("#include \"FFPLib_Common.hlsl\"\n"), "{vs}");
    assert!(vs.contains("uniform\tfloat4x4\tworldviewproj_matrix;\n"), "{vs}");
    assert!(
        vs.contains(
            "void main(\n\
             \tin float4 iPos_0 : POSITION,\n\
             \tin float4 iColor_0 : COLOR0,\n\
             \tin float2 iTexcoord_0 : TEXCOORD0,\n\
             \tout float4 oPos_0 : POSITION,\n\
             \tout float4 oColor_0 : COLOR0,\n\
             \tout float2 oTexcoord_0 : TEXCOORD0\n\
             )"
        ),
        "{vs}"
    );
    assert!(
        vs.contains("\tFFP_Transform(worldviewproj_matrix, iPos_0, oPos_0);\n"),
        "{vs}"
    );

    let fs = &shaders.fragment_source;
    assert!(
        fs.contains("uniform\tsampler2D\tgTextureSampler0 : register(s0);\n"),
        "{fs}"
    );
    assert!(
        fs.contains("\ttexel_0 = tex2D(gTextureSampler0, iTexcoord_0);\n"),
        "{fs}"
    );
    assert!(
        fs.contains("\tFFP_Modulate(texel_0, oColor_0, oColor_0);\n"),
        "{fs}"
    );
}

#[test]
fn textured_pass_in_glsl() {
    let shaders = generate("glsl");

    let vs = &shaders.vertex_source;
    assert!(vs.starts_with("#version 120\n"), "{vs}");
    assert!(vs.contains("#include \"FFPLib_Transform.glsl\"\n"), "{vs}");
    assert!(vs.contains("varying vec2 oTexcoord_0;\n"), "{vs}");

    let fs = &shaders.fragment_source;
    assert!(fs.contains("#include \"FFPLib_Texturing.glsl\"\n"), "{fs}");
    assert!(fs.contains("varying vec2 oTexcoord_0;\n"), "{fs}");
    assert!(
        fs.contains("\ttexel_0 = texture2D(gTextureSampler0, oTexcoord_0);\n"),
        "{fs}"
    );
}

#[test]
fn two_texture_stages_are_packed_into_one_slot() {
    init_tracing();
    let mut target = TargetRenderState::new();
    target.add_sub_render_state(Box::new(FfpTransform::default()));
    target.add_sub_render_state(Box::new(FfpColour::default()));
    target.add_sub_render_state(Box::new(FfpTexturing::new(0)));
    target.add_sub_render_state(Box::new(FfpTexturing::new(1)));

    let options = ShaderGenOptions::default().with_compact_policy(CompactPolicy::Medium);
    let mut context = GenerationContext::with_bundled_libraries(options);
    let shaders = context.generate_render_state(&mut target).unwrap();

    let vs = &shaders.vertex_source;
    assert!(vs.contains("\tout float4 oTexcoord_0 : TEXCOORD0\n"), "{vs}");
    assert!(!vs.contains("TEXCOORD1"), "{vs}");
    assert!(vs.contains("\toTexcoord_0.xy = iTexcoord_0;\n"), "{vs}");
    assert!(vs.contains("\toTexcoord_0.zw = iTexcoord_1;\n"), "{vs}");

    let fs = &shaders.fragment_source;
    assert!(fs.contains("\tin float4 iTexcoord_0 : TEXCOORD0,\n"), "{fs}");
    assert!(
        fs.contains("\ttexel_0 = tex2D(gTextureSampler0, iTexcoord_0.xy);\n"),
        "{fs}"
    );
    assert!(
        fs.contains("\ttexel_1 = tex2D(gTextureSampler1, iTexcoord_0.zw);\n"),
        "{fs}"
    );
}

#[test]
fn auto_constants_are_shared_and_declared_once() {
    let mut set = ProgramSet::new();
    let first = set
        .vertex_mut()
        .resolve_auto_parameter_int(AutoConstantType::WorldMatrix, 0)
        .unwrap();
    let second = set
        .vertex_mut()
        .resolve_auto_parameter_int(AutoConstantType::WorldMatrix, 0)
        .unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(set.vertex().uniforms().len(), 1);

    let mut context = GenerationContext::with_bundled_libraries(ShaderGenOptions::default());
    let shaders = context.generate(&mut set).unwrap();
    assert_eq!(
        shaders
            .vertex_source
            .matches("uniform\tfloat4x4\tworld_matrix;")
            .count(),
        1
    );
}

#[test]
fn options_load_from_json() {
    let options: ShaderGenOptions = serde_json::from_str(
        r#"{
            "target_language": "hlsl",
            "compact_policy": "High",
            "max_texcoord_slots": 4,
            "hlsl_profiles": ["vs_4_0", "ps_4_0"]
        }"#,
    )
    .unwrap();
    assert_eq!(options.max_texcoord_floats, 32);
    let mut context = GenerationContext::with_bundled_libraries(options);
    let shaders = context.generate_render_state(&mut textured_pass()).unwrap();

    assert!(
        shaders
            .vertex_source
            .contains("\tin unsigned int iColor_0_packed : COLOR0,\n"),
        "{}",
        shaders.vertex_source
    );
    assert!(
        shaders
            .fragment_source
            .contains("\tout float4 oColor_0 : SV_Target\n"),
        "{}",
        shaders.fragment_source
    );
}

#[test]
fn failures_surface_from_generation() {
    let options = ShaderGenOptions::default().with_target_language("metal");
    let mut context = GenerationContext::with_bundled_libraries(options);
    assert!(matches!(
        context.generate_render_state(&mut textured_pass()),
        Err(Error::UnknownLanguage(language)) if language == "metal"
    ));

    // No fallback when a library cannot be opened.
    let options = ShaderGenOptions::default().with_target_language("glsles");
    let mut context = GenerationContext::new(
        options,
        Rc::new(aero_shadergen::MemoryLibrarySource::new()),
    );
    assert!(matches!(
        context.generate_render_state(&mut textured_pass()),
        Err(Error::LibraryNotFound(name)) if name == "FFPLib_Transform.glsles"
    ));
}
