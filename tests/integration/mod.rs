mod formation_flow;
mod queue_flow;
