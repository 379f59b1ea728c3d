use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, Expr, FnArg, ItemFn, LitStr, Pat, ReturnType,
};

/// Turns a function into a tracked stepper task.
///
/// ```ignore
/// #[step(phase = "setup", task = "Load config", order = 2.0)]
/// fn load_config(path: &str) -> (bool, String) { ... }
///
/// // becomes callable as
/// let ok: bool = load_config(&stepper, "app.yaml");
/// ```
///
/// The generated function takes a `&stepper::Stepper` as its first argument
/// and returns `bool`. The annotated body may return anything implementing
/// `IntoStepResult`. `async fn` is supported and produces an `async fn`.
///
/// A companion `fn <name>_step(&Stepper) -> stepper::Result<Step>` is emitted
/// next to it. It builds the same task (same identity), so it can be passed to
/// `Stepper::declare` to show the task before it runs:
///
/// ```ignore
/// stepper.declare(&load_config_step(&stepper)?);
/// ```
#[proc_macro_attribute]
pub fn step(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut meta = StepMeta::default();
    let parser = syn::meta::parser(|nested| meta.parse(nested));
    parse_macro_input!(attr with parser);

    let func = parse_macro_input!(item as ItemFn);

    match expand(meta, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct StepMeta {
    phase: Option<LitStr>,
    task: Option<LitStr>,
    order: Option<Expr>,
}

impl StepMeta {
    fn parse(&mut self, meta: syn::meta::ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("phase") {
            self.phase = Some(non_empty(meta.value()?.parse()?, "phase")?);
        } else if meta.path.is_ident("task") {
            self.task = Some(non_empty(meta.value()?.parse()?, "task")?);
        } else if meta.path.is_ident("order") || meta.path.is_ident("increment") {
            self.order = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("unsupported step property, expected phase, task or order"));
        }
        Ok(())
    }
}

fn non_empty(lit: LitStr, what: &str) -> syn::Result<LitStr> {
    if lit.value().trim().is_empty() {
        return Err(syn::Error::new(lit.span(), format!("step {} must not be empty", what)));
    }
    Ok(lit)
}

fn expand(meta: StepMeta, func: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let span = func.sig.span();
    let phase = meta
        .phase
        .ok_or_else(|| syn::Error::new(span, "missing `phase = \"...\"`"))?;
    let task = meta
        .task
        .ok_or_else(|| syn::Error::new(span, "missing `task = \"...\"`"))?;
    let order = meta.order.unwrap_or_else(|| syn::parse_quote!(0.0));

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    let mut arg_names = Vec::new();
    for input in &sig.inputs {
        match input {
            FnArg::Receiver(recv) => {
                return Err(syn::Error::new(
                    recv.span(),
                    "#[step] cannot be applied to methods taking self",
                ));
            }
            FnArg::Typed(pat_type) => match pat_type.pat.as_ref() {
                Pat::Ident(ident) if ident.by_ref.is_none() => arg_names.push(ident.ident.clone()),
                other => {
                    return Err(syn::Error::new(
                        other.span(),
                        "#[step] arguments must be plain identifiers",
                    ));
                }
            },
        }
    }

    let ident = &sig.ident;
    let body_ident = format_ident!("__{}_step_body", ident);
    let step_ident = format_ident!("{}_step", ident);
    let inputs = &sig.inputs;
    let generics = &sig.generics;
    let where_clause = &sig.generics.where_clause;
    let asyncness = &sig.asyncness;
    let output = match &sig.output {
        ReturnType::Default => quote! {},
        ReturnType::Type(arrow, ty) => quote! { #arrow #ty },
    };

    let outer_inputs = if inputs.is_empty() {
        quote! { stepper: &::stepper::Stepper }
    } else {
        quote! { stepper: &::stepper::Stepper, #inputs }
    };

    let identity = quote! { concat!(module_path!(), "::", stringify!(#ident)) };

    let call = if asyncness.is_some() {
        quote! {
            stepper
                .run_named_async(#phase, #task, (#order) as f64, #identity, #body_ident(#(#arg_names),*))
                .await
        }
    } else {
        quote! {
            stepper.run_named(#phase, #task, (#order) as f64, #identity, move || {
                #body_ident(#(#arg_names),*)
            })
        }
    };

    Ok(quote! {
        #(#attrs)*
        #vis #asyncness fn #ident #generics (#outer_inputs) -> bool #where_clause {
            #asyncness fn #body_ident #generics (#inputs) #output #where_clause #block

            #call
        }

        #[doc = concat!("Task run by `", stringify!(#ident), "`, for `Stepper::declare`")]
        #[allow(dead_code)]
        #vis fn #step_ident(stepper: &::stepper::Stepper) -> ::stepper::Result<::stepper::Step> {
            stepper.step_with_identity(
                #phase,
                #task,
                (#order) as f64,
                ::stepper::Identity::named(#identity),
            )
        }
    })
}
