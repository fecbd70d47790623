mod binding_case;
mod transport_case;
